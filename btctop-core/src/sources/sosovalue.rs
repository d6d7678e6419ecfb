//! SoSoValue spot BTC ETF flows.
//!
//! The feed lists one item per (fund, day). Flows are summed per calendar day
//! so the resulting series is the aggregate daily net flow across all funds.

use super::http;
use super::provider::{FetchError, SeriesRequest, SeriesSource};
use crate::domain::{Observation, RawSeries};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub const SOSOVALUE_ETF_URL: &str = "https://api.sosovalue.com/data/v1/etf/spotBTC";
const PROVIDER: &str = "sosovalue_etf";
const ITEM_LIMIT: u32 = 40;

#[derive(Debug, Deserialize)]
struct EtfResponse {
    data: EtfData,
}

#[derive(Debug, Deserialize)]
struct EtfData {
    #[serde(default)]
    items: Vec<EtfItem>,
}

#[derive(Debug, Deserialize)]
struct EtfItem {
    date: Option<String>,
    #[serde(default)]
    flow: Option<FlowValue>,
}

/// The feed is inconsistent about quoting numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlowValue {
    Number(f64),
    Text(String),
}

impl FlowValue {
    fn as_f64(&self) -> Result<f64, FetchError> {
        match self {
            FlowValue::Number(v) => Ok(*v),
            FlowValue::Text(s) if s.trim().is_empty() => Ok(0.0),
            FlowValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| FetchError::parse(PROVIDER, format!("invalid flow '{s}': {e}"))),
        }
    }
}

pub struct SoSoValueEtfFlowSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl SoSoValueEtfFlowSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: http::build_client(PROVIDER, timeout)?,
            url: SOSOVALUE_ETF_URL.to_string(),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sum per-fund flows into one net flow per day. Items without a date are
    /// skipped; a missing flow counts as zero.
    pub fn parse_flows(series_id: &str, body: &str) -> Result<RawSeries, FetchError> {
        let resp: EtfResponse = http::decode(PROVIDER, body)?;

        let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for item in resp.data.items {
            let Some(day) = item.date else { continue };
            let date = NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d")
                .map_err(|e| FetchError::parse(PROVIDER, format!("invalid date '{day}': {e}")))?;
            let flow = match &item.flow {
                Some(v) => v.as_f64()?,
                None => 0.0,
            };
            *daily.entry(date).or_insert(0.0) += flow;
        }

        if daily.is_empty() {
            return Err(FetchError::parse(PROVIDER, "feed returned no dated items"));
        }

        let points = daily
            .into_iter()
            .map(|(date, flow)| Observation::new(date, flow))
            .collect();
        RawSeries::new(PROVIDER, series_id, "USD", points)
            .map_err(|e| FetchError::from_series(PROVIDER, e))
    }
}

impl SeriesSource for SoSoValueEtfFlowSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<RawSeries, FetchError> {
        let limit = ITEM_LIMIT.to_string();
        let req = self.client.get(&self.url).query(&[("limit", limit.as_str())]);
        let body = http::get_body(PROVIDER, req)?;
        Self::parse_flows(&request.series_id, &body)
    }
}
