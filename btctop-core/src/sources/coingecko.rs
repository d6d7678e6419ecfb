//! CoinGecko adapters: per-coin market-cap history and global dominance share.

use super::http;
use super::provider::{FetchError, SeriesRequest, SeriesSource};
use crate::domain::{Observation, RawSeries};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const COINGECKO_BASE: &str = "https://api.coingecko.com/api/v3";
const MARKET_CAP_PROVIDER: &str = "coingecko_market_cap";
const DOMINANCE_PROVIDER: &str = "coingecko_dominance";
const DEMO_KEY_HEADER: &str = "x-cg-demo-api-key";

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    market_caps: Vec<(f64, Option<f64>)>,
}

#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    market_cap_percentage: HashMap<String, f64>,
    updated_at: Option<i64>,
}

fn date_from_millis(provider: &str, ms: f64) -> Result<NaiveDate, FetchError> {
    DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| FetchError::parse(provider, format!("invalid timestamp: {ms}")))
}

fn build(
    api_key: Option<String>,
    timeout: Duration,
    provider: &str,
) -> Result<(reqwest::blocking::Client, Option<String>), FetchError> {
    Ok((
        http::build_client(provider, timeout)?,
        api_key.filter(|k| !k.trim().is_empty()),
    ))
}

/// Daily market capitalisation of one coin (`series_id` is the CoinGecko coin id,
/// e.g. `tether`).
pub struct CoinGeckoMarketCapSource {
    client: reqwest::blocking::Client,
    api_key: Option<String>,
    base_url: String,
}

impl CoinGeckoMarketCapSource {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        let (client, api_key) = build(api_key, timeout, MARKET_CAP_PROVIDER)?;
        Ok(Self {
            client,
            api_key,
            base_url: COINGECKO_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parse `market_caps` pairs. Null caps are dropped; same-day points collapse
    /// to the latest one.
    pub fn parse_market_chart(coin_id: &str, body: &str) -> Result<RawSeries, FetchError> {
        let resp: MarketChartResponse = http::decode(MARKET_CAP_PROVIDER, body)?;

        let mut points = Vec::with_capacity(resp.market_caps.len());
        for (ms, cap) in resp.market_caps {
            let Some(cap) = cap else { continue };
            points.push(Observation::new(date_from_millis(MARKET_CAP_PROVIDER, ms)?, cap));
        }

        if points.is_empty() {
            return Err(FetchError::parse(
                MARKET_CAP_PROVIDER,
                format!("no market caps for {coin_id}"),
            ));
        }

        RawSeries::normalized(MARKET_CAP_PROVIDER, coin_id, "USD", points)
            .map_err(|e| FetchError::from_series(MARKET_CAP_PROVIDER, e))
    }
}

impl SeriesSource for CoinGeckoMarketCapSource {
    fn name(&self) -> &str {
        MARKET_CAP_PROVIDER
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<RawSeries, FetchError> {
        let url = format!("{}/coins/{}/market_chart", self.base_url, request.series_id);
        let days = request.span_days().to_string();
        let mut req = self.client.get(url).query(&[
            ("vs_currency", "usd"),
            ("days", days.as_str()),
            ("interval", "daily"),
        ]);
        if let Some(key) = &self.api_key {
            req = req.header(DEMO_KEY_HEADER, key);
        }

        let body = http::get_body(MARKET_CAP_PROVIDER, req)?;
        Self::parse_market_chart(&request.series_id, &body)
    }
}

/// Current share of total crypto market cap held by one coin, as a one-point
/// series (`series_id` is the CoinGecko symbol key, e.g. `usdt`).
pub struct CoinGeckoDominanceSource {
    client: reqwest::blocking::Client,
    api_key: Option<String>,
    base_url: String,
}

impl CoinGeckoDominanceSource {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        let (client, api_key) = build(api_key, timeout, DOMINANCE_PROVIDER)?;
        Ok(Self {
            client,
            api_key,
            base_url: COINGECKO_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parse the `/global` payload. `fallback_date` is used when the payload has
    /// no `updated_at` stamp.
    pub fn parse_global(
        symbol: &str,
        body: &str,
        fallback_date: NaiveDate,
    ) -> Result<RawSeries, FetchError> {
        let resp: GlobalResponse = http::decode(DOMINANCE_PROVIDER, body)?;

        let share = resp
            .data
            .market_cap_percentage
            .get(symbol)
            .copied()
            .ok_or_else(|| {
                FetchError::parse(
                    DOMINANCE_PROVIDER,
                    format!("market_cap_percentage has no '{symbol}' entry"),
                )
            })?;

        let date = match resp.data.updated_at {
            Some(secs) => date_from_millis(DOMINANCE_PROVIDER, secs as f64 * 1000.0)?,
            None => fallback_date,
        };

        RawSeries::new(DOMINANCE_PROVIDER, symbol, "%", vec![Observation::new(date, share)])
            .map_err(|e| FetchError::from_series(DOMINANCE_PROVIDER, e))
    }
}

impl SeriesSource for CoinGeckoDominanceSource {
    fn name(&self) -> &str {
        DOMINANCE_PROVIDER
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<RawSeries, FetchError> {
        let mut req = self.client.get(format!("{}/global", self.base_url));
        if let Some(key) = &self.api_key {
            req = req.header(DEMO_KEY_HEADER, key);
        }

        let body = http::get_body(DOMINANCE_PROVIDER, req)?;
        Self::parse_global(&request.series_id, &body, request.end)
    }
}
