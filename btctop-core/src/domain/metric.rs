use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A named scalar derived from one or more raw series.
///
/// `as_of` is the date of the newest observation that fed the value, so two
/// runs over identical data produce identical metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetric {
    pub name: String,
    pub value: f64,
    pub as_of: NaiveDate,
}

impl DerivedMetric {
    pub fn new(name: impl Into<String>, value: f64, as_of: NaiveDate) -> Self {
        Self {
            name: name.into(),
            value,
            as_of,
        }
    }
}
