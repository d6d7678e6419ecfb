//! Orchestrator: load → fetch → compute → merge → save.
//!
//! One run is a single sequential batch apart from the fetch stage, which may
//! run on a bounded rayon pool. Any indicator-level failure keeps that
//! indicator's previous value; only snapshot I/O aborts the run.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use btctop_core::aggregate::{self, AggregateError, MetricSet, SeriesSet, WeightedInput};
use btctop_core::domain::{Indicator, InvariantError, RawSeries};
use btctop_core::signal;
use btctop_core::sources::{FetchError, SeriesKey, SourceRegistry};
use btctop_core::store::{merge, SnapshotStore, StoreError};
use btctop_core::transform::{self, TransformError};

use crate::catalog::{IndicatorDef, Recipe};
use crate::config::PipelineConfig;
use crate::report::{IndicatorOutcome, RunReport};

/// Why one indicator could not be refreshed. Never fatal.
#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error("computed value rejected: {0}")]
    Invalid(#[from] InvariantError),
}

impl IndicatorError {
    /// Leaf cause, e.g. `auth_missing` or `insufficient_history`.
    pub fn kind(&self) -> &'static str {
        match self {
            IndicatorError::Fetch(e) => e.kind.as_str(),
            IndicatorError::Transform(e) => e.kind(),
            IndicatorError::Aggregate(e) => e.kind(),
            IndicatorError::Invalid(_) => "invalid_value",
        }
    }
}

/// Fatal run errors.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of every planned fetch, keyed by series.
pub type FetchedSeries = BTreeMap<SeriesKey, Result<RawSeries, FetchError>>;

pub struct Pipeline {
    registry: SourceRegistry,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(registry: SourceRegistry, config: PipelineConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one refresh against `store`, treating `as_of` as today.
    ///
    /// The previous snapshot is loaded before any network traffic, so a corrupt
    /// file aborts the run without fetching and is never overwritten.
    pub fn run(&self, store: &SnapshotStore, as_of: NaiveDate) -> Result<RunReport, RunError> {
        let previous = store.load()?;

        let plan = self.config.fetch_plan();
        info!(
            indicators = self.config.indicators.len(),
            series = plan.len(),
            %as_of,
            "starting indicator refresh"
        );
        let fetched = self.fetch_all(&plan, as_of);
        let series_fetched = fetched.values().filter(|r| r.is_ok()).count();

        let mut updates = Vec::with_capacity(self.config.indicators.len());
        let mut outcomes = Vec::with_capacity(self.config.indicators.len());
        for def in &self.config.indicators {
            match evaluate(def, &fetched, self.config.tolerance_days) {
                Ok(indicator) => {
                    let reading = signal::read(&indicator);
                    info!(
                        indicator = %indicator.name,
                        current = indicator.current,
                        progress_pct = reading.progress_pct,
                        hit_top = reading.hit_top,
                        "indicator updated"
                    );
                    updates.push(indicator.clone());
                    outcomes.push(IndicatorOutcome::Updated {
                        indicator,
                        signal: reading,
                    });
                }
                Err(e) => {
                    let prior = previous.get(&def.name).cloned();
                    warn!(
                        indicator = %def.name,
                        kind = e.kind(),
                        error = %e,
                        kept_previous = prior.is_some(),
                        "indicator not refreshed"
                    );
                    outcomes.push(IndicatorOutcome::Stale {
                        name: def.name.clone(),
                        error: e.to_string(),
                        previous: prior,
                    });
                }
            }
        }

        let merged = merge(&previous, &updates);
        store.save(&merged)?;

        let report = RunReport {
            as_of,
            outcomes,
            series_fetched,
            series_requested: plan.len(),
        };
        info!(
            updated = report.updated(),
            stale = report.stale(),
            path = %store.path().display(),
            "snapshot saved"
        );
        Ok(report)
    }

    /// Fetch every planned series exactly once.
    fn fetch_all(&self, plan: &BTreeMap<SeriesKey, i64>, as_of: NaiveDate) -> FetchedSeries {
        let jobs: Vec<(&SeriesKey, NaiveDate)> = plan
            .iter()
            .map(|(key, days)| (key, history_start(as_of, *days)))
            .collect();

        let fetch_one = |(key, start): &(&SeriesKey, NaiveDate)| {
            let result = self.registry.fetch(key, *start, as_of);
            match &result {
                Ok(series) => debug!(series = %key, points = series.len(), "fetched"),
                Err(e) => warn!(series = %key, kind = e.kind.as_str(), error = %e, "fetch failed"),
            }
            ((*key).clone(), result)
        };

        if self.config.fetch_workers > 1 && jobs.len() > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.fetch_workers)
                .build()
            {
                Ok(pool) => return pool.install(|| jobs.par_iter().map(fetch_one).collect()),
                Err(e) => warn!(error = %e, "failed to build fetch pool, fetching sequentially"),
            }
        }
        jobs.iter().map(fetch_one).collect()
    }
}

fn history_start(as_of: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|span| as_of.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN)
}

fn lookup<'a>(
    fetched: &'a FetchedSeries,
    key: &SeriesKey,
) -> Result<&'a RawSeries, IndicatorError> {
    match fetched.get(key) {
        Some(Ok(series)) => Ok(series),
        Some(Err(e)) => Err(e.clone().into()),
        None => Err(FetchError::network(
            key.provider.to_string(),
            format!("{key} was not fetched this run"),
        )
        .into()),
    }
}

/// Compute one indicator from the fetched series.
pub fn evaluate(
    def: &IndicatorDef,
    fetched: &FetchedSeries,
    tolerance_days: i64,
) -> Result<Indicator, IndicatorError> {
    let keys = def.required_series();
    let value = match &def.recipe {
        Recipe::Yoy { .. } => {
            transform::yoy(lookup(fetched, &keys[0])?, tolerance_days)?.value
        }

        Recipe::Zscore { window, .. } => {
            transform::zscore(lookup(fetched, &keys[0])?, *window)?.value
        }

        Recipe::NetLiquidity { .. } => {
            let mut metrics = MetricSet::new();
            for key in &keys {
                let yoy = lookup(fetched, key)
                    .and_then(|s| transform::yoy(s, tolerance_days).map_err(IndicatorError::from));
                metrics.insert(key.series_id.as_str(), yoy);
            }
            aggregate::net_liquidity_from(
                &metrics,
                &keys[0].series_id,
                &keys[1].series_id,
                &keys[2].series_id,
            )?
            .value
        }

        Recipe::NetLiquidityImpulse { window_days, .. } => {
            let mut yoy_series = SeriesSet::new();
            for key in &keys {
                let yoy = lookup(fetched, key).and_then(|s| {
                    transform::yoy_series(s, tolerance_days).map_err(IndicatorError::from)
                });
                yoy_series.insert(key.series_id.as_str(), yoy);
            }
            let net = aggregate::net_liquidity_series(
                yoy_series.require(&keys[0].series_id)?,
                yoy_series.require(&keys[1].series_id)?,
                yoy_series.require(&keys[2].series_id)?,
                tolerance_days,
            )?;
            aggregate::impulse(&net, *window_days, tolerance_days)?.value
        }

        Recipe::StablecoinGrowth { window_days, .. } => {
            let mut inputs = InputWeights::new();
            for key in &keys {
                let component = lookup(fetched, key)
                    .and_then(|s| weighted_growth(s, *window_days, tolerance_days));
                inputs.insert(key.series_id.as_str(), component);
            }
            let components = keys
                .iter()
                .map(|k| inputs.require(&k.series_id).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            aggregate::weighted_average(&def.name, &components)?.value
        }

        Recipe::Dominance { .. } => {
            let series = lookup(fetched, &keys[0])?;
            series
                .latest()
                .ok_or_else(|| TransformError::ShortWindow {
                    series: series.series_id().to_string(),
                    window: 1,
                    available: 0,
                })?
                .value
        }

        Recipe::EtfNetFlow { days, .. } => {
            transform::trailing_sum(lookup(fetched, &keys[0])?, *days)?.value
        }
    };

    let indicator = def.to_indicator(value);
    indicator.validate()?;
    Ok(indicator)
}

type InputWeights = aggregate::InputSet<WeightedInput>;

/// N-day growth of one market-cap series, weighted by its latest cap.
fn weighted_growth(
    series: &RawSeries,
    days: i64,
    tolerance_days: i64,
) -> Result<WeightedInput, IndicatorError> {
    let metric = transform::growth(series, days, tolerance_days)?;
    let weight = series.latest().map(|p| p.value).unwrap_or(0.0);
    Ok(WeightedInput { metric, weight })
}

#[cfg(test)]
mod tests {
    use super::*;
    use btctop_core::domain::Observation;
    use btctop_core::sources::{FetchErrorKind, Provider};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn daily(id: &str, end: NaiveDate, days: i64, f: impl Fn(i64) -> f64) -> RawSeries {
        let points = (0..=days)
            .rev()
            .map(|back| Observation::new(end - Duration::days(back), f(back)))
            .collect();
        RawSeries::new("test", id, "", points).unwrap()
    }

    fn def_for(recipe: Recipe) -> IndicatorDef {
        let mut def = crate::catalog::default_catalog().remove(0);
        def.recipe = recipe;
        def
    }

    #[test]
    fn history_start_saturates() {
        assert_eq!(history_start(d(2024, 6, 5), 10), d(2024, 5, 26));
        assert_eq!(history_start(d(2024, 6, 5), i64::MAX), NaiveDate::MIN);
    }

    #[test]
    fn unfetched_series_is_fetch_error() {
        let def = def_for(Recipe::Yoy {
            series: "WALCL".into(),
        });
        let err = evaluate(&def, &FetchedSeries::new(), 5).unwrap_err();
        assert_eq!(err.kind(), "network");
    }

    #[test]
    fn stablecoin_growth_is_cap_weighted() {
        let end = d(2024, 6, 5);
        let mut fetched = FetchedSeries::new();
        fetched.insert(
            SeriesKey::new(Provider::CoinGeckoMarketCap, "tether"),
            Ok(daily("tether", end, 120, |back| if back >= 90 { 100.0 } else { 110.0 })),
        );
        fetched.insert(
            SeriesKey::new(Provider::CoinGeckoMarketCap, "usd-coin"),
            Ok(daily("usd-coin", end, 120, |back| if back >= 90 { 50.0 } else { 51.0 })),
        );

        let def = def_for(Recipe::StablecoinGrowth {
            coins: vec!["tether".into(), "usd-coin".into()],
            window_days: 90,
        });
        let ind = evaluate(&def, &fetched, 5).unwrap();
        let expected = (10.0 * 110.0 + 2.0 * 51.0) / 161.0;
        assert!((ind.current - expected).abs() < 1e-9);
    }

    #[test]
    fn stablecoin_growth_needs_every_coin() {
        let end = d(2024, 6, 5);
        let mut fetched = FetchedSeries::new();
        fetched.insert(
            SeriesKey::new(Provider::CoinGeckoMarketCap, "tether"),
            Ok(daily("tether", end, 120, |_| 100.0)),
        );
        fetched.insert(
            SeriesKey::new(Provider::CoinGeckoMarketCap, "usd-coin"),
            Err(FetchError::network("coingecko_market_cap", "timed out")),
        );

        let def = def_for(Recipe::StablecoinGrowth {
            coins: vec!["tether".into(), "usd-coin".into()],
            window_days: 90,
        });
        let err = evaluate(&def, &fetched, 5).unwrap_err();
        assert!(matches!(
            err,
            IndicatorError::Aggregate(AggregateError::MissingInput { .. })
        ));
    }

    #[test]
    fn zscore_recipe() {
        let end = d(2024, 6, 5);
        let mut fetched = FetchedSeries::new();
        // 1, 2, 3, 4, 5 over the last five days
        fetched.insert(
            SeriesKey::new(Provider::Fred, "WALCL"),
            Ok(daily("WALCL", end, 4, |back| (5 - back) as f64)),
        );
        let def = def_for(Recipe::Zscore {
            series: "WALCL".into(),
            window: 5,
            cadence_days: 1,
        });
        let ind = evaluate(&def, &fetched, 5).unwrap();
        // mean 3, population stddev sqrt(2)
        assert!((ind.current - 2.0 / 2.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn short_zscore_series_reports_its_window() {
        let mut fetched = FetchedSeries::new();
        fetched.insert(
            SeriesKey::new(Provider::Fred, "WALCL"),
            Ok(daily("WALCL", d(2024, 6, 5), 9, |back| back as f64)),
        );
        let def = def_for(Recipe::Zscore {
            series: "WALCL".into(),
            window: 52,
            cadence_days: 7,
        });
        let err = evaluate(&def, &fetched, 5).unwrap_err();
        assert_eq!(err.kind(), "short_window");
        assert!(matches!(
            err,
            IndicatorError::Transform(TransformError::ShortWindow {
                window: 52,
                available: 10,
                ..
            })
        ));
    }

    #[test]
    fn fetch_failures_report_their_kind() {
        let mut fetched = FetchedSeries::new();
        fetched.insert(
            SeriesKey::new(Provider::Fred, "WALCL"),
            Err(FetchError::auth_missing("fred", "FRED_API_KEY is not configured")),
        );
        let def = def_for(Recipe::Yoy {
            series: "WALCL".into(),
        });
        assert_eq!(evaluate(&def, &fetched, 5).unwrap_err().kind(), "auth_missing");
    }

    #[test]
    fn auth_missing_surfaces_through_composite() {
        let mut fetched = FetchedSeries::new();
        for id in ["WALCL", "WTREGEN", "RRPONTSYD"] {
            fetched.insert(
                SeriesKey::new(Provider::Fred, id),
                Err(FetchError::auth_missing("fred", "FRED_API_KEY is not configured")),
            );
        }
        let def = def_for(Recipe::NetLiquidity {
            balance_sheet: "WALCL".into(),
            tga: "WTREGEN".into(),
            rrp: "RRPONTSYD".into(),
        });
        let err = evaluate(&def, &fetched, 5).unwrap_err();
        assert_eq!(err.kind(), "missing_input");
        match err {
            IndicatorError::Aggregate(AggregateError::MissingInput { reason, .. }) => {
                assert!(reason.contains(&FetchErrorKind::AuthMissing.to_string()));
            }
            other => panic!("expected MissingInput, got {other:?}"),
        }
    }
}
