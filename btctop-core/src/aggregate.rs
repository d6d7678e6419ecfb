//! Composite indicators built from already-transformed inputs.
//!
//! NetLiquidity        = BalanceSheetYoY - TGA_YoY - RRP_YoY
//! NetLiquidityImpulse = RollingDelta(NetLiquidity series, W days)
//! Weighted growth     = Σ growth_i * w_i / Σ w_i   (w_i = market cap)
//!
//! Inputs arrive through an `InputSet`, which remembers why an input failed so
//! a composite can report the root cause instead of a bare "missing".

use crate::domain::{DerivedMetric, Observation, RawSeries};
use crate::transform::{self, TransformError};
use std::collections::BTreeMap;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregateError {
    #[error("missing input '{input}': {reason}")]
    MissingInput { input: String, reason: String },

    #[error("weights sum to {total}, cannot form a weighted average")]
    DegenerateWeights { total: f64 },

    #[error("inputs {inputs:?} share no dates within tolerance")]
    NoOverlap { inputs: Vec<String> },

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl AggregateError {
    /// Leaf cause; transform failures report their own kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AggregateError::MissingInput { .. } => "missing_input",
            AggregateError::DegenerateWeights { .. } => "degenerate_weights",
            AggregateError::NoOverlap { .. } => "no_overlap",
            AggregateError::Transform(e) => e.kind(),
        }
    }
}

/// Named inputs for a composite, each either available or failed with a reason.
#[derive(Debug, Clone)]
pub struct InputSet<T> {
    entries: BTreeMap<String, Result<T, String>>,
}

impl<T> Default for InputSet<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> InputSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of computing one input.
    pub fn insert<E: Display>(&mut self, name: impl Into<String>, outcome: Result<T, E>) {
        self.entries
            .insert(name.into(), outcome.map_err(|e| e.to_string()));
    }

    /// Borrow an input, or explain why it is unavailable.
    pub fn require(&self, name: &str) -> Result<&T, AggregateError> {
        match self.entries.get(name) {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(AggregateError::MissingInput {
                input: name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(AggregateError::MissingInput {
                input: name.to_string(),
                reason: "not computed this run".to_string(),
            }),
        }
    }

    pub fn is_available(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(Ok(_)))
    }
}

pub type MetricSet = InputSet<DerivedMetric>;
pub type SeriesSet = InputSet<RawSeries>;

/// Balance sheet YoY minus the two drain accounts' YoY.
///
/// `as_of` is the oldest of the three inputs: the composite is only as fresh
/// as its stalest component.
pub fn net_liquidity(
    balance_sheet_yoy: &DerivedMetric,
    tga_yoy: &DerivedMetric,
    rrp_yoy: &DerivedMetric,
) -> DerivedMetric {
    let as_of = balance_sheet_yoy
        .as_of
        .min(tga_yoy.as_of)
        .min(rrp_yoy.as_of);
    DerivedMetric::new(
        "Net Liquidity",
        balance_sheet_yoy.value - tga_yoy.value - rrp_yoy.value,
        as_of,
    )
}

/// Net liquidity from named inputs in a metric set.
pub fn net_liquidity_from(
    metrics: &MetricSet,
    balance_sheet: &str,
    tga: &str,
    rrp: &str,
) -> Result<DerivedMetric, AggregateError> {
    let bs = metrics.require(balance_sheet)?;
    let tga = metrics.require(tga)?;
    let rrp = metrics.require(rrp)?;
    Ok(net_liquidity(bs, tga, rrp))
}

/// Net liquidity evaluated on every balance-sheet YoY date where the TGA and
/// RRP YoY series have a point within `tolerance_days`.
pub fn net_liquidity_series(
    balance_sheet_yoy: &RawSeries,
    tga_yoy: &RawSeries,
    rrp_yoy: &RawSeries,
    tolerance_days: i64,
) -> Result<RawSeries, AggregateError> {
    let points: Vec<Observation> = balance_sheet_yoy
        .points()
        .iter()
        .filter_map(|bs| {
            let tga = tga_yoy.nearest(bs.date, tolerance_days)?;
            let rrp = rrp_yoy.nearest(bs.date, tolerance_days)?;
            Some(Observation::new(bs.date, bs.value - tga.value - rrp.value))
        })
        .collect();

    if points.is_empty() {
        return Err(AggregateError::NoOverlap {
            inputs: vec![
                balance_sheet_yoy.series_id().to_string(),
                tga_yoy.series_id().to_string(),
                rrp_yoy.series_id().to_string(),
            ],
        });
    }

    RawSeries::new("composite", "net_liquidity", "%", points).map_err(|_| {
        AggregateError::NoOverlap {
            inputs: vec![balance_sheet_yoy.series_id().to_string()],
        }
    })
}

/// Momentum of a composite: its change over the last `days`.
pub fn impulse(
    series: &RawSeries,
    days: i64,
    tolerance_days: i64,
) -> Result<DerivedMetric, AggregateError> {
    let delta = transform::rolling_delta(series, days, tolerance_days)?;
    Ok(DerivedMetric::new(
        format!("{} impulse {days}d", series.series_id()),
        delta.value,
        delta.as_of,
    ))
}

/// One component of a weighted blend.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedInput {
    pub metric: DerivedMetric,
    pub weight: f64,
}

/// Weighted average of component metrics; weights need not be normalized.
pub fn weighted_average(
    name: &str,
    inputs: &[WeightedInput],
) -> Result<DerivedMetric, AggregateError> {
    let total: f64 = inputs.iter().map(|i| i.weight).sum();
    if inputs.is_empty() || total <= 0.0 || !total.is_finite() {
        return Err(AggregateError::DegenerateWeights { total });
    }

    let value = inputs.iter().map(|i| i.metric.value * i.weight).sum::<f64>() / total;
    let as_of = inputs
        .iter()
        .map(|i| i.metric.as_of)
        .min()
        .ok_or(AggregateError::DegenerateWeights { total })?;

    Ok(DerivedMetric::new(name, value, as_of))
}
