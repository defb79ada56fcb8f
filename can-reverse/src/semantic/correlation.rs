//! Pearson correlation matrices over aligned signals

use crate::semantic::frame::SignalFrame;
use crate::types::SignalKey;
use rayon::prelude::*;
use serde::Serialize;

/// Pearson coefficient, None when either series has zero variance
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len() as f64;
    let mean_x: f64 = x.iter().sum::<f64>() / n;
    let mean_y: f64 = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for i in 0..x.len() {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x > 0.0 && var_y > 0.0 {
        Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
    } else {
        None
    }
}

/// Round a coefficient to two decimals before comparing it with a threshold.
///
/// Rounds the exact binary value, half to even, so `0.845` (stored as
/// 0.84499999...) becomes 0.84.
pub fn round_correlation(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let lower = (value * 100.0).floor();
    // value * 200 == doubled + residual exactly
    let doubled = value * 200.0;
    let residual = value.mul_add(200.0, -doubled);
    let midpoint = 2.0 * lower + 1.0;

    let rounded = if doubled < midpoint || (doubled == midpoint && residual < 0.0) {
        lower
    } else if doubled > midpoint || residual > 0.0 {
        lower + 1.0
    } else if lower % 2.0 == 0.0 {
        lower
    } else {
        lower + 1.0
    };
    rounded / 100.0
}

/// Symmetric, key-indexed correlation matrix. Undefined entries are NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    keys: Vec<SignalKey>,
    values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Build from explicit keys and a square table
    pub fn new(keys: Vec<SignalKey>, values: Vec<Vec<f64>>) -> Self {
        debug_assert!(values.len() == keys.len() && values.iter().all(|r| r.len() == keys.len()));
        Self { keys, values }
    }

    /// Correlate every pair of columns of a frame
    pub fn from_frame(frame: &SignalFrame) -> Self {
        let n = frame.columns.len();
        let upper: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (i..n)
                    .map(|j| {
                        pearson_correlation(&frame.columns[i], &frame.columns[j]).unwrap_or(f64::NAN)
                    })
                    .collect()
            })
            .collect();

        let mut values = vec![vec![f64::NAN; n]; n];
        for (i, row) in upper.iter().enumerate() {
            for (offset, &value) in row.iter().enumerate() {
                values[i][i + offset] = value;
                values[i + offset][i] = value;
            }
        }

        Self {
            keys: frame.keys.clone(),
            values,
        }
    }

    pub fn keys(&self) -> &[SignalKey] {
        &self.keys
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    /// Coefficient between two keys, if both are present
    pub fn value(&self, a: &SignalKey, b: &SignalKey) -> Option<f64> {
        let row = self.keys.iter().position(|k| k == a)?;
        let col = self.keys.iter().position(|k| k == b)?;
        Some(self.values[row][col])
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Drop every key whose series has no variance.
    ///
    /// Such a key has an undefined self-correlation and an undefined coefficient
    /// against every other key; the pairs among the remaining keys are untouched.
    pub fn drop_undefined(&self) -> Self {
        let keep: Vec<usize> = (0..self.keys.len())
            .filter(|&i| !self.values[i][i].is_nan())
            .collect();
        if keep.len() < self.keys.len() {
            log::debug!(
                "Dropping {} signal(s) with undefined correlation",
                self.keys.len() - keep.len()
            );
        }

        Self {
            keys: keep.iter().map(|&i| self.keys[i]).collect(),
            values: keep
                .iter()
                .map(|&i| keep.iter().map(|&j| self.values[i][j]).collect())
                .collect(),
        }
    }
}
