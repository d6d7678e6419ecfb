//! Pure numeric transforms over raw series.
//!
//! - YoY:           (v[t] / v[t-365d] - 1) * 100
//! - Growth (N):    (v[t] / v[t-N d] - 1) * 100
//! - Z-score:       (v[t] - mean(window)) / stddev(window), population stddev
//! - Rolling delta: v[t] - v[t-W d]
//! - Trailing sum:  sum of the last N observations
//!
//! Lookbacks resolve to the nearest observation within a tolerance window, so
//! weekly and daily series can be mixed. Nothing here rounds.

use crate::domain::{DerivedMetric, Observation, RawSeries};
use chrono::{Duration, NaiveDate};
use thiserror::Error;

/// Default slack when looking up the value N days back.
pub const DEFAULT_TOLERANCE_DAYS: i64 = 5;

/// Lookback used by year-over-year comparisons.
pub const YEAR_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("series '{series}' has no observation {lookback_days} days back (±{tolerance_days}d)")]
    InsufficientHistory {
        series: String,
        lookback_days: i64,
        tolerance_days: i64,
    },

    #[error("series '{series}' has {available} observations, window needs {window}")]
    ShortWindow {
        series: String,
        window: usize,
        available: usize,
    },

    #[error("series '{series}' has zero variance over the last {window} observations")]
    DegenerateWindow { series: String, window: usize },

    #[error("series '{series}' has a zero base value on {date}")]
    ZeroBase { series: String, date: NaiveDate },
}

impl TransformError {
    pub fn kind(&self) -> &'static str {
        match self {
            TransformError::InsufficientHistory { .. } => "insufficient_history",
            TransformError::ShortWindow { .. } => "short_window",
            TransformError::DegenerateWindow { .. } => "degenerate_window",
            TransformError::ZeroBase { .. } => "zero_base",
        }
    }
}

fn insufficient(series: &RawSeries, lookback_days: i64, tolerance_days: i64) -> TransformError {
    TransformError::InsufficientHistory {
        series: series.series_id().to_string(),
        lookback_days,
        tolerance_days,
    }
}

fn short_window(series: &RawSeries, window: usize) -> TransformError {
    TransformError::ShortWindow {
        series: series.series_id().to_string(),
        window,
        available: series.len(),
    }
}

/// Base observation roughly `days` before `at`, strictly older than `at`.
fn lookback<'a>(
    series: &'a RawSeries,
    at: &Observation,
    days: i64,
    tolerance_days: i64,
) -> Option<&'a Observation> {
    series.nearest_before(at.date - Duration::days(days), at.date, tolerance_days)
}

fn pct_change(
    series: &RawSeries,
    base: &Observation,
    current: &Observation,
) -> Result<f64, TransformError> {
    if base.value == 0.0 {
        return Err(TransformError::ZeroBase {
            series: series.series_id().to_string(),
            date: base.date,
        });
    }
    Ok((current.value / base.value - 1.0) * 100.0)
}

/// Percent change of the latest value over the value `days` earlier.
pub fn growth(
    series: &RawSeries,
    days: i64,
    tolerance_days: i64,
) -> Result<DerivedMetric, TransformError> {
    let latest = series
        .latest()
        .ok_or_else(|| insufficient(series, days, tolerance_days))?;
    let base = lookback(series, latest, days, tolerance_days)
        .ok_or_else(|| insufficient(series, days, tolerance_days))?;

    Ok(DerivedMetric::new(
        format!("{} growth {days}d", series.series_id()),
        pct_change(series, base, latest)?,
        latest.date,
    ))
}

/// Year-over-year percent change of the latest value.
pub fn yoy(series: &RawSeries, tolerance_days: i64) -> Result<DerivedMetric, TransformError> {
    let g = growth(series, YEAR_DAYS, tolerance_days)?;
    Ok(DerivedMetric::new(
        format!("{} YoY", series.series_id()),
        g.value,
        g.as_of,
    ))
}

/// YoY evaluated at every observation that has a year-ago counterpart.
///
/// Points whose base is zero are skipped. Fails if no point qualifies.
pub fn yoy_series(series: &RawSeries, tolerance_days: i64) -> Result<RawSeries, TransformError> {
    let points: Vec<Observation> = series
        .points()
        .iter()
        .filter_map(|p| {
            let base = lookback(series, p, YEAR_DAYS, tolerance_days)?;
            pct_change(series, base, p)
                .ok()
                .map(|v| Observation::new(p.date, v))
        })
        .collect();

    if points.is_empty() {
        return Err(insufficient(series, YEAR_DAYS, tolerance_days));
    }

    // Dates are a subset of an already ordered series and values are finite
    // ratios of finite inputs, so construction cannot fail on order.
    RawSeries::new(
        series.provider(),
        format!("{}_yoy", series.series_id()),
        "%",
        points,
    )
    .map_err(|_| insufficient(series, YEAR_DAYS, tolerance_days))
}

/// Latest value minus the value `days` earlier ("impulse" when applied to a
/// composite).
pub fn rolling_delta(
    series: &RawSeries,
    days: i64,
    tolerance_days: i64,
) -> Result<DerivedMetric, TransformError> {
    let latest = series
        .latest()
        .ok_or_else(|| insufficient(series, days, tolerance_days))?;
    let base = lookback(series, latest, days, tolerance_days)
        .ok_or_else(|| insufficient(series, days, tolerance_days))?;

    Ok(DerivedMetric::new(
        format!("{} delta {days}d", series.series_id()),
        latest.value - base.value,
        latest.date,
    ))
}

/// Z-score of the latest value against the last `window` observations.
pub fn zscore(series: &RawSeries, window: usize) -> Result<DerivedMetric, TransformError> {
    let n = series.len();
    if window == 0 || n < window {
        return Err(short_window(series, window));
    }

    let tail = &series.points()[n - window..];
    let mean = tail.iter().map(|p| p.value).sum::<f64>() / window as f64;
    let variance = tail
        .iter()
        .map(|p| {
            let diff = p.value - mean;
            diff * diff
        })
        .sum::<f64>()
        / window as f64;
    let stddev = variance.sqrt();

    if stddev == 0.0 {
        return Err(TransformError::DegenerateWindow {
            series: series.series_id().to_string(),
            window,
        });
    }

    let latest = &tail[window - 1];
    Ok(DerivedMetric::new(
        format!("{} z{window}", series.series_id()),
        (latest.value - mean) / stddev,
        latest.date,
    ))
}

/// Sum of the last `n` observations, or of all of them when fewer exist.
pub fn trailing_sum(series: &RawSeries, n: usize) -> Result<DerivedMetric, TransformError> {
    let latest = series
        .latest()
        .filter(|_| n > 0)
        .ok_or_else(|| short_window(series, n))?;

    let points = series.points();
    let start = points.len().saturating_sub(n);
    let total = points[start..].iter().map(|p| p.value).sum();

    Ok(DerivedMetric::new(
        format!("{} sum {n}", series.series_id()),
        total,
        latest.date,
    ))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn yoy_basic() {
        // 100 -> 110 one year later = +10%
        let s = make_series("WALCL", &[(d(2023, 6, 1), 100.0), (d(2024, 5, 31), 110.0)]);
        let m = yoy(&s, DEFAULT_TOLERANCE_DAYS).unwrap();
        assert_approx(m.value, 10.0, EPSILON);
        assert_eq!(m.as_of, d(2024, 5, 31));
        assert_eq!(m.name, "WALCL YoY");
    }

    #[test]
    fn yoy_uses_nearest_point_within_tolerance() {
        // Year-ago target is 2023-06-02 (leap year); 2023-06-04 is 2 days off and closest.
        let s = make_series(
            "WTREGEN",
            &[
                (d(2023, 5, 20), 50.0),
                (d(2023, 6, 4), 80.0),
                (d(2024, 5, 31), 100.0),
            ],
        );
        let m = yoy(&s, DEFAULT_TOLERANCE_DAYS).unwrap();
        assert_approx(m.value, 25.0, EPSILON);
    }

    #[test]
    fn yoy_fails_outside_tolerance() {
        let s = make_series("RRPONTSYD", &[(d(2023, 5, 20), 50.0), (d(2024, 5, 31), 100.0)]);
        let err = yoy(&s, DEFAULT_TOLERANCE_DAYS).unwrap_err();
        assert!(matches!(
            err,
            TransformError::InsufficientHistory { lookback_days: 365, .. }
        ));
    }

    #[test]
    fn yoy_zero_base_is_an_error() {
        let s = make_series("RRPONTSYD", &[(d(2023, 6, 1), 0.0), (d(2024, 5, 31), 100.0)]);
        assert!(matches!(
            yoy(&s, DEFAULT_TOLERANCE_DAYS),
            Err(TransformError::ZeroBase { .. })
        ));
    }

    #[test]
    fn negative_change_keeps_sign() {
        let s = make_series("RRPONTSYD", &[(d(2023, 6, 1), 400.0), (d(2024, 5, 31), 6.0)]);
        let m = yoy(&s, DEFAULT_TOLERANCE_DAYS).unwrap();
        assert_approx(m.value, -98.5, EPSILON);
    }

    #[test]
    fn growth_90d() {
        let s = make_series("tether", &[(d(2024, 3, 1), 100.0), (d(2024, 5, 30), 105.0)]);
        let m = growth(&s, 90, DEFAULT_TOLERANCE_DAYS).unwrap();
        assert_approx(m.value, 5.0, EPSILON);
    }

    #[test]
    fn growth_base_ignores_a_closer_latest_point() {
        // Target 06-06: the latest point (06-09) is closer, 06-01 is exactly 5 days off.
        let s = make_series("x", &[(d(2024, 6, 1), 100.0), (d(2024, 6, 9), 110.0)]);
        let m = growth(&s, 3, 5).unwrap();
        assert_approx(m.value, 10.0, EPSILON);

        let delta = rolling_delta(&s, 3, 5).unwrap();
        assert_approx(delta.value, 10.0, EPSILON);
    }

    #[test]
    fn growth_never_compares_latest_with_itself() {
        let s = make_series("tether", &[(d(2024, 5, 30), 105.0)]);
        assert!(growth(&s, 3, DEFAULT_TOLERANCE_DAYS).is_err());
    }

    #[test]
    fn rolling_delta_is_raw_units() {
        let s = weekly(
            "net",
            d(2024, 1, 3),
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 20.0],
        );
        // 13 weeks = 91 days back from the last point
        let m = rolling_delta(&s, 90, DEFAULT_TOLERANCE_DAYS).unwrap();
        assert_approx(m.value, 19.0, EPSILON);
    }

    #[test]
    fn yoy_series_only_covers_points_with_history() {
        let start = d(2023, 1, 4);
        let values: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let s = weekly("WALCL", start, &values);
        let ys = yoy_series(&s, DEFAULT_TOLERANCE_DAYS).unwrap();

        // First point with a 52-week (364 day) counterpart is index 52.
        assert_eq!(ys.points()[0].date, start + Duration::days(7 * 52));
        assert_eq!(ys.len(), 8);
        assert_approx(ys.points()[0].value, (152.0 / 100.0 - 1.0) * 100.0, EPSILON);
        assert_eq!(ys.unit(), "%");
    }

    #[test]
    fn yoy_series_without_history_fails() {
        let s = weekly("WALCL", d(2024, 1, 3), &[1.0, 2.0, 3.0]);
        assert!(yoy_series(&s, DEFAULT_TOLERANCE_DAYS).is_err());
    }

    #[test]
    fn zscore_basic() {
        // window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population stddev 2
        let s = weekly("x", d(2024, 1, 3), &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let m = zscore(&s, 8).unwrap();
        assert_approx(m.value, 2.0, EPSILON);
    }

    #[test]
    fn zscore_flat_window_is_degenerate() {
        let s = weekly("x", d(2024, 1, 3), &[3.0, 3.0, 3.0]);
        assert_eq!(
            zscore(&s, 3),
            Err(TransformError::DegenerateWindow {
                series: "x".into(),
                window: 3
            })
        );
    }

    #[test]
    fn zscore_short_series_is_short_window() {
        let s = weekly("x", d(2024, 1, 3), &[1.0, 2.0]);
        assert_eq!(
            zscore(&s, 5),
            Err(TransformError::ShortWindow {
                series: "x".into(),
                window: 5,
                available: 2
            })
        );
    }

    #[test]
    fn trailing_sum_takes_last_n() {
        let s = make_series(
            "spotBTC",
            &[
                (d(2024, 6, 3), 10.0),
                (d(2024, 6, 4), -5.0),
                (d(2024, 6, 5), 20.0),
            ],
        );
        assert_approx(trailing_sum(&s, 2).unwrap().value, 15.0, EPSILON);
        assert_approx(trailing_sum(&s, 5).unwrap().value, 25.0, EPSILON);
        assert!(trailing_sum(&s, 0).is_err());
    }
}
