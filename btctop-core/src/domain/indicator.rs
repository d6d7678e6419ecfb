//! Persisted dashboard records.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Which side of the reference level counts as "closer to a market top".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherWorse,
    LowerWorse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::HigherWorse => f.write_str("higher_worse"),
            Direction::LowerWorse => f.write_str("lower_worse"),
        }
    }
}

/// One dashboard row. `name` is the identity key used when merging snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,
    pub category: String,
    pub current: f64,
    #[serde(rename = "ref")]
    pub reference: f64,
    pub direction: Direction,
    #[serde(default)]
    pub unit: String,
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantError {
    #[error("indicator has an empty name")]
    EmptyName,

    #[error("indicator '{name}': strength {strength} is outside [0, 1]")]
    StrengthOutOfRange { name: String, strength: f64 },

    #[error("indicator '{name}': {field} is not a finite number")]
    NonFinite { name: String, field: &'static str },

    #[error("duplicate indicator name '{0}'")]
    DuplicateName(String),
}

impl Indicator {
    pub fn validate(&self) -> Result<(), InvariantError> {
        if self.name.trim().is_empty() {
            return Err(InvariantError::EmptyName);
        }
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(InvariantError::StrengthOutOfRange {
                name: self.name.clone(),
                strength: self.strength,
            });
        }
        if !self.current.is_finite() {
            return Err(InvariantError::NonFinite {
                name: self.name.clone(),
                field: "current",
            });
        }
        if !self.reference.is_finite() {
            return Err(InvariantError::NonFinite {
                name: self.name.clone(),
                field: "ref",
            });
        }
        Ok(())
    }
}

/// Full dashboard state: an ordered sequence of indicators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub indicators: Vec<Indicator>,
}

impl Snapshot {
    pub fn new(indicators: Vec<Indicator>) -> Self {
        Self { indicators }
    }

    pub fn get(&self, name: &str) -> Option<&Indicator> {
        self.indicators.iter().find(|i| i.name == name)
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.indicators.iter().map(|i| i.name.as_str())
    }

    /// Check every record plus name uniqueness.
    pub fn validate(&self) -> Result<(), InvariantError> {
        let mut seen = HashSet::with_capacity(self.indicators.len());
        for ind in &self.indicators {
            ind.validate()?;
            if !seen.insert(ind.name.as_str()) {
                return Err(InvariantError::DuplicateName(ind.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicator(name: &str, strength: f64) -> Indicator {
        Indicator {
            name: name.into(),
            category: "Liquidity".into(),
            current: 8.2,
            reference: 20.0,
            direction: Direction::HigherWorse,
            unit: "%".into(),
            strength,
        }
    }

    #[test]
    fn serializes_with_ref_and_snake_case_direction() {
        let json = serde_json::to_value(indicator("TGA YoY", 0.6)).unwrap();
        assert_eq!(json["ref"], 20.0);
        assert_eq!(json["direction"], "higher_worse");
        assert!(json.get("reference").is_none());
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let raw = r#"{"name":"X","category":"c","current":1,"ref":2,"direction":"sideways","unit":"","strength":0.5}"#;
        assert!(serde_json::from_str::<Indicator>(raw).is_err());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let raw = r#"{"name":"X","category":"c","current":1,"ref":2,"direction":"lower_worse","unit":"%","strength":0.5,"detail":"legacy"}"#;
        let ind: Indicator = serde_json::from_str(raw).unwrap();
        assert_eq!(ind.direction, Direction::LowerWorse);
    }

    #[test]
    fn strength_out_of_range_fails_validation() {
        assert!(indicator("X", 1.2).validate().is_err());
        assert!(indicator("X", -0.1).validate().is_err());
        assert!(indicator("X", 1.0).validate().is_ok());
    }

    #[test]
    fn duplicate_names_fail_validation() {
        let snap = Snapshot::new(vec![indicator("X", 0.5), indicator("X", 0.5)]);
        assert_eq!(
            snap.validate(),
            Err(InvariantError::DuplicateName("X".into()))
        );
    }
}
