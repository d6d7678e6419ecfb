//! Domain types shared by every pipeline stage.

pub mod indicator;
pub mod metric;
pub mod series;

pub use indicator::{Direction, Indicator, InvariantError, Snapshot};
pub use metric::DerivedMetric;
pub use series::{Observation, RawSeries, SeriesError};
