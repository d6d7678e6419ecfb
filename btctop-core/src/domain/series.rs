//! Raw provider series.
//!
//! A `RawSeries` is the only shape that leaves a source adapter: one value per
//! calendar date, dates strictly increasing, every value finite.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One dated value of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series '{series}' is not strictly increasing at {date}")]
    Unordered { series: String, date: NaiveDate },

    #[error("series '{series}' has a non-finite value at {date}")]
    NonFinite { series: String, date: NaiveDate },
}

/// Ordered numeric time series produced by a source adapter for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    provider: String,
    series_id: String,
    unit: String,
    points: Vec<Observation>,
}

impl RawSeries {
    /// Build a series, rejecting duplicate or decreasing dates and NaN/inf values.
    pub fn new(
        provider: impl Into<String>,
        series_id: impl Into<String>,
        unit: impl Into<String>,
        points: Vec<Observation>,
    ) -> Result<Self, SeriesError> {
        let series_id = series_id.into();

        for (i, p) in points.iter().enumerate() {
            if !p.value.is_finite() {
                return Err(SeriesError::NonFinite {
                    series: series_id,
                    date: p.date,
                });
            }
            if i > 0 && points[i - 1].date >= p.date {
                return Err(SeriesError::Unordered {
                    series: series_id,
                    date: p.date,
                });
            }
        }

        Ok(Self {
            provider: provider.into(),
            series_id,
            unit: unit.into(),
            points,
        })
    }

    /// Sort by date and keep the last value seen for each date before validating.
    ///
    /// Providers sometimes append an intraday point that shares a date with the
    /// previous daily close; the later one wins.
    pub fn normalized(
        provider: impl Into<String>,
        series_id: impl Into<String>,
        unit: impl Into<String>,
        mut points: Vec<Observation>,
    ) -> Result<Self, SeriesError> {
        // stable sort keeps provider order within a date
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<Observation> = Vec::with_capacity(points.len());
        for p in points {
            match deduped.last_mut() {
                Some(last) if last.date == p.date => *last = p,
                _ => deduped.push(p),
            }
        }
        Self::new(provider, series_id, unit, deduped)
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent observation.
    pub fn latest(&self) -> Option<&Observation> {
        self.points.last()
    }

    /// Observation closest to `target`, provided it lies within `tolerance_days`.
    ///
    /// On equal distance the earlier observation wins.
    pub fn nearest(&self, target: NaiveDate, tolerance_days: i64) -> Option<&Observation> {
        nearest_in(&self.points, target, tolerance_days)
    }

    /// Like [`nearest`](Self::nearest), but only considers observations dated
    /// strictly before `cutoff`.
    pub fn nearest_before(
        &self,
        target: NaiveDate,
        cutoff: NaiveDate,
        tolerance_days: i64,
    ) -> Option<&Observation> {
        let end = self.points.partition_point(|p| p.date < cutoff);
        nearest_in(&self.points[..end], target, tolerance_days)
    }
}

fn nearest_in(
    points: &[Observation],
    target: NaiveDate,
    tolerance_days: i64,
) -> Option<&Observation> {
    let idx = points.partition_point(|p| p.date < target);
    let before = idx.checked_sub(1).and_then(|i| points.get(i));
    let after = points.get(idx);

    let best = match (before, after) {
        (Some(b), Some(a)) => {
            let db = (target - b.date).num_days();
            let da = (a.date - target).num_days();
            if da < db {
                a
            } else {
                b
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };

    ((best.date - target).num_days().abs() <= tolerance_days).then_some(best)
}
