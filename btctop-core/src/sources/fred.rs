//! FRED (St. Louis Fed) series observations.
//!
//! Serves the balance-sheet inputs: WALCL (Fed total assets), WTREGEN (Treasury
//! General Account) and RRPONTSYD (overnight reverse repo). Requires an API key.

use super::http;
use super::provider::{FetchError, SeriesRequest, SeriesSource};
use crate::domain::{Observation, RawSeries};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

pub const FRED_BASE: &str = "https://api.stlouisfed.org/fred/series/observations";
const PROVIDER: &str = "fred";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

pub struct FredSource {
    client: reqwest::blocking::Client,
    api_key: Option<String>,
    base_url: String,
}

impl FredSource {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: http::build_client(PROVIDER, timeout)?,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: FRED_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Unit reported by FRED for the series this pipeline uses.
    pub fn unit_for(series_id: &str) -> &'static str {
        match series_id {
            "WALCL" => "USD mn",
            "WTREGEN" | "RRPONTSYD" => "USD bn",
            _ => "",
        }
    }

    /// Parse an observations payload. Placeholder values ("." or empty) are skipped.
    pub fn parse_observations(series_id: &str, body: &str) -> Result<RawSeries, FetchError> {
        let resp: ObservationsResponse = http::decode(PROVIDER, body)?;

        let mut points = Vec::with_capacity(resp.observations.len());
        for obs in resp.observations {
            let raw = obs.value.trim();
            if raw.is_empty() || raw == "." {
                continue;
            }
            let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").map_err(|e| {
                FetchError::parse(PROVIDER, format!("invalid date '{}': {e}", obs.date))
            })?;
            let value: f64 = raw.parse().map_err(|e| {
                FetchError::parse(PROVIDER, format!("invalid value '{raw}' on {date}: {e}"))
            })?;
            points.push(Observation::new(date, value));
        }

        if points.is_empty() {
            return Err(FetchError::parse(
                PROVIDER,
                format!("no usable observations for {series_id}"),
            ));
        }

        RawSeries::normalized(PROVIDER, series_id, Self::unit_for(series_id), points)
            .map_err(|e| FetchError::from_series(PROVIDER, e))
    }
}

impl SeriesSource for FredSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<RawSeries, FetchError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            FetchError::auth_missing(PROVIDER, "FRED_API_KEY is not configured")
        })?;

        let start = request.start.format("%Y-%m-%d").to_string();
        let end = request.end.format("%Y-%m-%d").to_string();
        let req = self.client.get(&self.base_url).query(&[
            ("series_id", request.series_id.as_str()),
            ("file_type", "json"),
            ("observation_start", start.as_str()),
            ("observation_end", end.as_str()),
            ("api_key", api_key),
        ]);

        let body = http::get_body(PROVIDER, req)?;
        Self::parse_observations(&request.series_id, &body)
    }
}
