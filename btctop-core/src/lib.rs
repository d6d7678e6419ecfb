//! btctop core: the indicator computation pipeline's building blocks.
//!
//! - Domain types (raw series, derived metrics, indicators, snapshots)
//! - Source adapters for FRED, CoinGecko and SoSoValue
//! - Pure transforms (YoY, growth, z-score, rolling delta, trailing sum)
//! - Composite aggregation (net liquidity, impulse, weighted blends)
//! - Signal mapping onto a 0-100 % progress scale
//! - Snapshot store with atomic writes and merge-on-failure

pub mod aggregate;
pub mod domain;
pub mod signal;
pub mod sources;
pub mod store;
pub mod transform;

pub use domain::{DerivedMetric, Direction, Indicator, Observation, RawSeries, Snapshot};
pub use signal::SignalReading;
pub use store::{merge, SnapshotStore, StoreError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: adapters and pipeline values can cross the fetch pool.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<RawSeries>();
        require_sync::<RawSeries>();
        require_send::<sources::FetchError>();
        require_sync::<sources::SourceRegistry>();
        require_send::<sources::FredSource>();
        require_sync::<sources::CoinGeckoMarketCapSource>();
        require_sync::<sources::SoSoValueEtfFlowSource>();
    }
}
