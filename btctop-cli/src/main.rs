//! btctop CLI: one full indicator refresh.
//!
//! Runs with no arguments. Every flag falls back to an environment variable,
//! and a `.env` file in the working directory is loaded first:
//! - `--snapshot` / `BTCTOP_SNAPSHOT`: snapshot file, default `data.json`
//! - `--config` / `BTCTOP_CONFIG`: optional TOML pipeline config
//! - `--fred-api-key` / `FRED_API_KEY`: without it the FRED-backed indicators
//!   keep their previous values
//! - `--coingecko-api-key` / `COINGECKO_API_KEY`: optional demo key
//! - `--log-format` / `BTCTOP_LOG_FORMAT`: `pretty` or `json`
//!
//! Exit status is 0 whenever the snapshot was written, even if some indicators
//! could not be refreshed, and 1 on fatal errors.

mod logging;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use btctop_core::sources::{
    CoinGeckoDominanceSource, CoinGeckoMarketCapSource, FredSource, Provider,
    SoSoValueEtfFlowSource, SourceRegistry,
};
use btctop_core::SnapshotStore;
use btctop_runner::{IndicatorOutcome, Pipeline, PipelineConfig, RunReport};

use logging::{init_logging, LogFormat};

#[derive(Parser)]
#[command(
    name = "btctop",
    version,
    about = "Refresh the BTC top-risk indicator snapshot"
)]
struct Cli {
    /// Snapshot file to read and update.
    #[arg(long, env = "BTCTOP_SNAPSHOT", default_value = "data.json")]
    snapshot: PathBuf,

    /// TOML pipeline config. Built-in defaults when omitted.
    #[arg(long, env = "BTCTOP_CONFIG")]
    config: Option<PathBuf>,

    /// FRED API key.
    #[arg(long, env = "FRED_API_KEY", hide_env_values = true)]
    fred_api_key: Option<String>,

    /// CoinGecko demo API key.
    #[arg(long, env = "COINGECKO_API_KEY", hide_env_values = true)]
    coingecko_api_key: Option<String>,

    /// Log output format.
    #[arg(long, env = "BTCTOP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Date treated as today (YYYY-MM-DD). Defaults to the local date.
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

fn main() -> Result<()> {
    // .env must be loaded before clap reads env fallbacks
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "ignoring unreadable .env"),
    }

    if let Err(e) = run(cli) {
        error!(error = %format!("{e:#}"), "refresh aborted");
        return Err(e);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if cli.fred_api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
        warn!("FRED_API_KEY is not set; FRED-backed indicators will keep their previous values");
    }

    let registry = build_registry(&cli, config.timeout())?;
    let store = SnapshotStore::new(&cli.snapshot);
    let as_of = cli.as_of.unwrap_or_else(|| chrono::Local::now().date_naive());

    let report = Pipeline::new(registry, config)
        .run(&store, as_of)
        .with_context(|| format!("refreshing {}", cli.snapshot.display()))?;

    print_summary(&report);
    Ok(())
}

fn build_registry(cli: &Cli, timeout: Duration) -> Result<SourceRegistry> {
    let fred = FredSource::new(cli.fred_api_key.clone(), timeout).context("building FRED client")?;
    let market_caps = CoinGeckoMarketCapSource::new(cli.coingecko_api_key.clone(), timeout)
        .context("building CoinGecko client")?;
    let dominance = CoinGeckoDominanceSource::new(cli.coingecko_api_key.clone(), timeout)
        .context("building CoinGecko client")?;
    let etf = SoSoValueEtfFlowSource::new(timeout).context("building SoSoValue client")?;

    Ok(SourceRegistry::new()
        .with(Provider::Fred, Box::new(fred))
        .with(Provider::CoinGeckoMarketCap, Box::new(market_caps))
        .with(Provider::CoinGeckoDominance, Box::new(dominance))
        .with(Provider::SoSoValueEtf, Box::new(etf)))
}

fn print_summary(report: &RunReport) {
    println!("\n=== Indicator refresh {} ===", report.as_of);
    println!(
        "{:<30} {:>18} {:>9} {:>5}  status",
        "indicator", "current", "progress", "top"
    );
    for outcome in &report.outcomes {
        match outcome {
            IndicatorOutcome::Updated { indicator, signal } => println!(
                "{:<30} {:>18} {:>8.1}% {:>5}  updated",
                indicator.name,
                format_value(indicator.current, &indicator.unit),
                signal.progress_pct,
                if signal.hit_top { "YES" } else { "-" },
            ),
            IndicatorOutcome::Stale {
                name,
                error,
                previous,
            } => {
                let kept = previous
                    .as_ref()
                    .map(|p| format_value(p.current, &p.unit))
                    .unwrap_or_else(|| "n/a".to_string());
                println!("{name:<30} {kept:>18} {:>9} {:>5}  stale: {error}", "", "");
            }
        }
    }
    println!(
        "\nUpdated {} / {} indicators ({} of {} series fetched)",
        report.updated(),
        report.outcomes.len(),
        report.series_fetched,
        report.series_requested
    );
    let hits: Vec<&str> = report.hits().map(|i| i.name.as_str()).collect();
    if !hits.is_empty() {
        println!("At threshold: {}", hits.join(", "));
    }
}

fn format_value(value: f64, unit: &str) -> String {
    match unit {
        "USD" => format!("{:.0} USD", value),
        "" => format!("{value:.2}"),
        other => format!("{value:.2} {other}"),
    }
}
