//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! built-in catalog with standard fetch settings:
//!
//! ```toml
//! fetch_workers = 4
//! tolerance_days = 5
//! history_padding_days = 30
//! timeout_secs = 20
//!
//! [[indicators]]
//! name = "RRP YoY"
//! category = "Liquidity"
//! ref = 20.0
//! direction = "higher_worse"
//! unit = "%"
//! strength = 0.5
//! recipe = { type = "yoy", series = "RRPONTSYD" }
//! ```
//!
//! When `[[indicators]]` is present it replaces the built-in catalog entirely.

use crate::catalog::{default_catalog, IndicatorDef};
use btctop_core::sources::SeriesKey;
use btctop_core::transform::DEFAULT_TOLERANCE_DAYS;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrent fetches. 1 fetches sequentially.
    pub fetch_workers: usize,

    /// Max distance in days between a lookback target and the observation used for it.
    pub tolerance_days: i64,

    /// Extra days fetched beyond each recipe's lookback.
    pub history_padding_days: i64,

    /// Per-request HTTP timeout.
    pub timeout_secs: u64,

    pub indicators: Vec<IndicatorDef>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_workers: 4,
            tolerance_days: DEFAULT_TOLERANCE_DAYS,
            history_padding_days: 30,
            timeout_secs: 20,
            indicators: default_catalog(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_workers == 0 {
            return Err(ConfigError::Invalid("fetch_workers must be at least 1".into()));
        }
        if self.tolerance_days < 0 {
            return Err(ConfigError::Invalid(format!(
                "tolerance_days must be non-negative, got {}",
                self.tolerance_days
            )));
        }
        if self.history_padding_days < 0 {
            return Err(ConfigError::Invalid(format!(
                "history_padding_days must be non-negative, got {}",
                self.history_padding_days
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }

        let mut seen = HashSet::new();
        for def in &self.indicators {
            def.validate().map_err(ConfigError::Invalid)?;
            if !seen.insert(def.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate indicator name '{}'",
                    def.name
                )));
            }
        }
        Ok(())
    }

    /// Distinct series the catalog needs, each with the history (in days) to
    /// request: the longest lookback of any recipe reading it, plus padding.
    pub fn fetch_plan(&self) -> BTreeMap<SeriesKey, i64> {
        let mut plan: BTreeMap<SeriesKey, i64> = BTreeMap::new();
        for def in &self.indicators {
            let days = def
                .recipe
                .lookback_days()
                .saturating_add(self.history_padding_days);
            for key in def.required_series() {
                let entry = plan.entry(key).or_insert(days);
                *entry = (*entry).max(days);
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Recipe;
    use btctop_core::sources::Provider;

    #[test]
    fn empty_file_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.indicators.len(), 8);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = PipelineConfig::from_toml_str("fetch_workers = 1\ntimeout_secs = 5").unwrap();
        assert_eq!(config.fetch_workers, 1);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.tolerance_days, DEFAULT_TOLERANCE_DAYS);
        assert_eq!(config.indicators.len(), 8);
    }

    #[test]
    fn indicators_replace_catalog() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [[indicators]]
            name = "USDT Dominance"
            category = "Stablecoins"
            ref = 4.5
            direction = "lower_worse"
            unit = "%"
            strength = 0.4

            [indicators.recipe]
            type = "dominance"
            symbol = "usdt"
            "#,
        )
        .unwrap();

        assert_eq!(config.indicators.len(), 1);
        assert_eq!(config.indicators[0].reference, 4.5);
        assert_eq!(
            config.indicators[0].recipe,
            Recipe::Dominance {
                symbol: "usdt".into()
            }
        );
    }

    #[test]
    fn unknown_recipe_type_is_parse_error() {
        let err = PipelineConfig::from_toml_str(
            r#"
            [[indicators]]
            name = "X"
            category = "c"
            ref = 1.0
            direction = "higher_worse"
            strength = 0.5
            recipe = { type = "moon_phase" }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml_str("fetch_workers = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut config = PipelineConfig::default();
        let dup = config.indicators[0].clone();
        config.indicators.push(dup);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/btctop.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn fetch_plan_dedupes_and_takes_longest_lookback() {
        let plan = PipelineConfig::default().fetch_plan();

        // 3 FRED + 2 market caps + dominance + ETF
        assert_eq!(plan.len(), 7);
        let walcl = SeriesKey::new(Provider::Fred, "WALCL");
        assert_eq!(plan[&walcl], 365 + 90 + 30);
        let tether = SeriesKey::new(Provider::CoinGeckoMarketCap, "tether");
        assert_eq!(plan[&tether], 120);
    }
}
