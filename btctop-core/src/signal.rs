//! Signal mapper: (current, ref, direction) -> progress toward the top threshold.
//!
//! higher_worse: progress = current / ref * 100, hit when current >= ref.
//! lower_worse:  progress = (ref - current) / |ref| * 100 while current < ref,
//!               otherwise 0; hit when current <= ref.
//! Progress is always clamped to [0, 100].
//!
//! A zero reference makes both ratios undefined. In that case the reading is
//! decided by the sign of `current` alone and progress is pinned to 100 when
//! the threshold is hit, 0 otherwise.

use crate::domain::{Direction, Indicator};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    pub progress_pct: f64,
    pub hit_top: bool,
}

impl SignalReading {
    fn pinned(hit_top: bool) -> Self {
        Self {
            progress_pct: if hit_top { 100.0 } else { 0.0 },
            hit_top,
        }
    }
}

fn clamp_pct(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 100.0)
    }
}

pub fn map(current: f64, reference: f64, direction: Direction) -> SignalReading {
    if !current.is_finite() || !reference.is_finite() {
        return SignalReading {
            progress_pct: 0.0,
            hit_top: false,
        };
    }

    match direction {
        Direction::HigherWorse => {
            let hit_top = current >= reference;
            if reference == 0.0 {
                return SignalReading::pinned(hit_top);
            }
            SignalReading {
                progress_pct: clamp_pct(current / reference * 100.0),
                hit_top,
            }
        }
        Direction::LowerWorse => {
            let hit_top = current <= reference;
            if reference == 0.0 {
                return SignalReading::pinned(hit_top);
            }
            let raw = if current < reference {
                (reference - current) / reference.abs() * 100.0
            } else {
                0.0
            };
            SignalReading {
                progress_pct: clamp_pct(raw),
                hit_top,
            }
        }
    }
}

/// Reading for a persisted indicator.
pub fn read(indicator: &Indicator) -> SignalReading {
    map(indicator.current, indicator.reference, indicator.direction)
}
