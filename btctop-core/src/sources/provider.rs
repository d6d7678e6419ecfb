//! Source adapter trait and structured fetch errors.
//!
//! The SeriesSource trait abstracts over providers (FRED, CoinGecko, SoSoValue)
//! so the orchestrator can fetch through a registry and tests can swap in mocks.

use crate::domain::{RawSeries, SeriesError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Why a fetch failed. Timeouts are reported as `Network`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Network,
    AuthMissing,
    ParseFailure,
}

impl FetchErrorKind {
    /// Stable snake_case label, matching the serde name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Network => "network",
            FetchErrorKind::AuthMissing => "auth_missing",
            FetchErrorKind::ParseFailure => "parse_failure",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Network => f.write_str("network"),
            FetchErrorKind::AuthMissing => f.write_str("auth missing"),
            FetchErrorKind::ParseFailure => f.write_str("parse failure"),
        }
    }
}

/// Failure of a single adapter call.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} error from {provider}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub provider: String,
    pub message: String,
}

impl FetchError {
    pub fn new(
        kind: FetchErrorKind,
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, provider, message)
    }

    pub fn auth_missing(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::AuthMissing, provider, message)
    }

    pub fn parse(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::ParseFailure, provider, message)
    }

    /// A payload that decoded but violated series invariants.
    pub fn from_series(provider: impl Into<String>, err: SeriesError) -> Self {
        Self::parse(provider, err.to_string())
    }
}

/// Which adapter serves a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Fred,
    CoinGeckoMarketCap,
    CoinGeckoDominance,
    SoSoValueEtf,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Fred => f.write_str("fred"),
            Provider::CoinGeckoMarketCap => f.write_str("coingecko_market_cap"),
            Provider::CoinGeckoDominance => f.write_str("coingecko_dominance"),
            Provider::SoSoValueEtf => f.write_str("sosovalue_etf"),
        }
    }
}

/// Identity of one raw series within a run. Each key is fetched at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub provider: Provider,
    pub series_id: String,
}

impl SeriesKey {
    pub fn new(provider: Provider, series_id: impl Into<String>) -> Self {
        Self {
            provider,
            series_id: series_id.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.series_id)
    }
}

/// Parameters of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub series_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SeriesRequest {
    pub fn new(series_id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            series_id: series_id.into(),
            start,
            end,
        }
    }

    /// Calendar days covered by the request, inclusive, at least 1.
    pub fn span_days(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(1)
    }
}

/// A provider adapter: fetch a named series, return ordered observations or fail.
///
/// Adapters are stateless apart from their HTTP client and credentials, make a
/// single attempt per call, and never retry.
pub trait SeriesSource: Send + Sync {
    /// Provider name used in errors and logs.
    fn name(&self) -> &str;

    fn fetch(&self, request: &SeriesRequest) -> Result<RawSeries, FetchError>;
}

/// Lookup table from provider to adapter.
#[derive(Default)]
pub struct SourceRegistry {
    sources: HashMap<Provider, Box<dyn SeriesSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Provider, source: Box<dyn SeriesSource>) {
        self.sources.insert(provider, source);
    }

    pub fn with(mut self, provider: Provider, source: Box<dyn SeriesSource>) -> Self {
        self.register(provider, source);
        self
    }

    pub fn get(&self, provider: Provider) -> Option<&dyn SeriesSource> {
        self.sources.get(&provider).map(|s| s.as_ref())
    }

    /// Fetch one series through the registered adapter for its provider.
    pub fn fetch(
        &self,
        key: &SeriesKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawSeries, FetchError> {
        let source = self.get(key.provider).ok_or_else(|| {
            FetchError::network(key.provider.to_string(), "no adapter registered for provider")
        })?;
        source.fetch(&SeriesRequest::new(key.series_id.clone(), start, end))
    }
}
