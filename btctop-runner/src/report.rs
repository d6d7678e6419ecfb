//! Per-run summary: what refreshed, what fell back to the previous value, and why.

use btctop_core::domain::Indicator;
use btctop_core::signal::SignalReading;
use chrono::NaiveDate;
use serde::Serialize;

/// Result of one indicator in one run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndicatorOutcome {
    Updated {
        indicator: Indicator,
        signal: SignalReading,
    },
    /// Computation failed; the snapshot keeps `previous` (if any) unchanged.
    Stale {
        name: String,
        error: String,
        previous: Option<Indicator>,
    },
}

impl IndicatorOutcome {
    pub fn name(&self) -> &str {
        match self {
            IndicatorOutcome::Updated { indicator, .. } => &indicator.name,
            IndicatorOutcome::Stale { name, .. } => name,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, IndicatorOutcome::Updated { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub as_of: NaiveDate,
    pub outcomes: Vec<IndicatorOutcome>,
    /// Series fetched successfully / attempted.
    pub series_fetched: usize,
    pub series_requested: usize,
}

impl RunReport {
    pub fn updated(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_updated()).count()
    }

    pub fn stale(&self) -> usize {
        self.outcomes.len() - self.updated()
    }

    pub fn get(&self, name: &str) -> Option<&IndicatorOutcome> {
        self.outcomes.iter().find(|o| o.name() == name)
    }

    /// Indicators currently at or past their threshold.
    pub fn hits(&self) -> impl Iterator<Item = &Indicator> {
        self.outcomes.iter().filter_map(|o| match o {
            IndicatorOutcome::Updated { indicator, signal } if signal.hit_top => Some(indicator),
            _ => None,
        })
    }
}
