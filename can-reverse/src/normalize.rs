//! Normalization strategies applied to TANG vectors and signal values

use serde::{Deserialize, Serialize};

/// How a vector is rescaled in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeStrategy {
    /// Rescale into [0, 1]
    #[default]
    MinMax,
    /// Leave values untouched
    Identity,
}

impl NormalizeStrategy {
    pub fn apply(&self, values: &mut [f64]) {
        match self {
            NormalizeStrategy::MinMax => min_max_normalize(values),
            NormalizeStrategy::Identity => {}
        }
    }
}

/// Min-max normalization in place.
///
/// A constant non-zero vector maps to all ones and a constant zero vector is left
/// as is, so a channel whose bits all flip equally often still reads as "busy".
pub fn min_max_normalize(values: &mut [f64]) {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if values.is_empty() || !min.is_finite() || !max.is_finite() {
        return;
    }

    let range = max - min;
    if range > 0.0 {
        for v in values.iter_mut() {
            *v = (*v - min) / range;
        }
    } else if max != 0.0 {
        for v in values.iter_mut() {
            *v /= max;
        }
    }
}
