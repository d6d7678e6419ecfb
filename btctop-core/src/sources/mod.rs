//! Source adapters: one per provider, each normalizing its payload into a
//! `RawSeries` at its own boundary.

pub mod coingecko;
pub mod fred;
pub mod http;
pub mod provider;
pub mod sosovalue;

pub use coingecko::{CoinGeckoDominanceSource, CoinGeckoMarketCapSource};
pub use fred::FredSource;
pub use provider::{
    FetchError, FetchErrorKind, Provider, SeriesKey, SeriesRequest, SeriesSource, SourceRegistry,
};
pub use sosovalue::SoSoValueEtfFlowSource;
