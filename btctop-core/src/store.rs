//! Snapshot store: the dashboard JSON file and its merge-on-failure semantics.
//!
//! Layout: a single pretty-printed JSON array of indicator objects.
//!
//! Features:
//! - Atomic writes (write to `{file}.tmp`, fsync, rename into place)
//! - Invariant validation on load and before save
//! - Pure `merge()` so carry-over of stale values is testable without I/O

use crate::domain::{Indicator, Snapshot};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Both variants are fatal for a run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corrupt snapshot {path}: {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("failed to write snapshot {path}: {reason}")]
    WriteFailure { path: PathBuf, reason: String },
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling used for staging writes: `data.json` -> `data.json.tmp`.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::CorruptSnapshot {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn write_failure(&self, reason: impl Into<String>) -> StoreError {
        StoreError::WriteFailure {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    /// Read the persisted snapshot.
    ///
    /// A missing file is a first run and yields an empty snapshot. Anything that
    /// exists but does not parse into valid indicators is `CorruptSnapshot`.
    pub fn load(&self) -> Result<Snapshot, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    path = %self.path.display(),
                    "snapshot not found, starting from an empty snapshot"
                );
                return Ok(Snapshot::default());
            }
            Err(e) => return Err(self.corrupt(format!("read: {e}"))),
        };

        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|e| self.corrupt(format!("parse: {e}")))?;
        snapshot
            .validate()
            .map_err(|e| self.corrupt(e.to_string()))?;

        debug!(path = %self.path.display(), indicators = snapshot.len(), "loaded snapshot");
        Ok(snapshot)
    }

    /// Persist the full snapshot atomically.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let tmp_path = self.stage(snapshot)?;
        self.commit(&tmp_path)
    }

    /// Validate, serialize and fsync the snapshot into the temp file.
    fn stage(&self, snapshot: &Snapshot) -> Result<PathBuf, StoreError> {
        snapshot
            .validate()
            .map_err(|e| self.write_failure(format!("refusing to write invalid snapshot: {e}")))?;

        let mut json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| self.write_failure(format!("serialize: {e}")))?;
        json.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| self.write_failure(format!("create dir: {e}")))?;
        }

        let tmp_path = self.tmp_path();
        let result = fs::File::create(&tmp_path).and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.write_failure(format!("write temp file: {e}")));
        }

        Ok(tmp_path)
    }

    /// Rename the staged file over the live one.
    fn commit(&self, tmp_path: &Path) -> Result<(), StoreError> {
        fs::rename(tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(tmp_path);
            self.write_failure(format!("atomic rename failed: {e}"))
        })?;
        debug!(path = %self.path.display(), "snapshot saved");
        Ok(())
    }
}

/// Overlay freshly computed indicators on the previous snapshot.
///
/// Previous entries keep their position and are replaced by name when an update
/// exists; entries without an update are carried over unchanged. Update names
/// absent from `previous` are appended in first-seen order. When `updates`
/// repeats a name, the last one wins.
pub fn merge(previous: &Snapshot, updates: &[Indicator]) -> Snapshot {
    let mut pending: HashMap<&str, &Indicator> = HashMap::with_capacity(updates.len());
    let mut order: Vec<&str> = Vec::with_capacity(updates.len());
    for update in updates {
        if pending.insert(update.name.as_str(), update).is_none() {
            order.push(update.name.as_str());
        }
    }

    let mut merged: Vec<Indicator> = previous
        .indicators
        .iter()
        .map(|old| pending.remove(old.name.as_str()).unwrap_or(old).clone())
        .collect();
    merged.extend(
        order
            .into_iter()
            .filter_map(|name| pending.remove(name))
            .cloned(),
    );

    Snapshot::new(merged)
}
