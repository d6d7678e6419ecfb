//! btctop runner: indicator catalog, pipeline configuration and the refresh run.
//!
//! This crate builds on `btctop-core` to provide:
//! - The built-in indicator catalog and its TOML-configurable recipes
//! - `PipelineConfig` with defaults for every setting
//! - `Pipeline::run`, which loads, fetches, computes, merges and saves
//! - `RunReport`, the per-indicator outcome of a run

pub mod catalog;
pub mod config;
pub mod pipeline;
pub mod report;

pub use catalog::{default_catalog, IndicatorDef, Recipe};
pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{evaluate, IndicatorError, Pipeline, RunError};
pub use report::{IndicatorOutcome, RunReport};
