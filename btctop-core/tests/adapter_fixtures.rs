//! Adapter parsers against frozen provider payloads, fed through the transforms
//! the pipeline applies to them.

use btctop_core::sources::{
    CoinGeckoDominanceSource, CoinGeckoMarketCapSource, FetchErrorKind, FredSource,
    SoSoValueEtfFlowSource,
};
use btctop_core::transform;
use chrono::NaiveDate;
use std::path::PathBuf;

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn fred_fixture_skips_placeholders_and_feeds_yoy() {
    let series = FredSource::parse_observations("WALCL", &fixture("fred_walcl.json")).unwrap();

    assert_eq!(series.len(), 3);
    assert_eq!(series.unit(), "USD mn");
    assert!(series.points().iter().all(|p| p.date != d(2024, 5, 29)));

    let yoy = transform::yoy(&series, transform::DEFAULT_TOLERANCE_DAYS).unwrap();
    assert!((yoy.value - -10.0).abs() < 1e-9, "yoy = {}", yoy.value);
    assert_eq!(yoy.as_of, d(2024, 6, 5));
}

#[test]
fn coingecko_market_chart_fixture_collapses_same_day() {
    let series = CoinGeckoMarketCapSource::parse_market_chart(
        "tether",
        &fixture("coingecko_tether_market_chart.json"),
    )
    .unwrap();

    let dates: Vec<NaiveDate> = series.points().iter().map(|p| p.date).collect();
    assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 1, 2)]);
    assert_eq!(series.latest().unwrap().value, 91_600_000_000.0);
}

#[test]
fn coingecko_global_fixture_reads_usdt_share() {
    let series = CoinGeckoDominanceSource::parse_global(
        "usdt",
        &fixture("coingecko_global.json"),
        d(2000, 1, 1),
    )
    .unwrap();

    let latest = series.latest().unwrap();
    assert_eq!(latest.value, 4.61);
    assert_eq!(latest.date, d(2024, 6, 5));
}

#[test]
fn coingecko_global_fixture_unknown_symbol_is_parse_failure() {
    let err = CoinGeckoDominanceSource::parse_global(
        "dai",
        &fixture("coingecko_global.json"),
        d(2024, 6, 5),
    )
    .unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::ParseFailure);
}

#[test]
fn sosovalue_fixture_sums_funds_per_day() {
    let body = fixture("sosovalue_spot_btc.json");
    let series = SoSoValueEtfFlowSource::parse_flows("spotBTC", &body).unwrap();

    let values: Vec<f64> = series.points().iter().map(|p| p.value).collect();
    assert_eq!(values, vec![180_000_000.0, 258_800_000.0, 220_000_000.0]);

    // Fewer than five days available: the sum covers what exists.
    let five_day = transform::trailing_sum(&series, 5).unwrap();
    assert_eq!(five_day.value, 658_800_000.0);
    assert_eq!(five_day.as_of, d(2024, 6, 5));
}
