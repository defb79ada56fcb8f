//! Signals aligned on a shared time axis
//!
//! Channels transmit at different rates, so before two signals can be correlated
//! they are resampled onto one index by nearest-timestamp matching.

use crate::types::{Signal, SignalKey, SignalMap};

/// Column-oriented table of signals sharing one time index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalFrame {
    pub index: Vec<f64>,
    pub keys: Vec<SignalKey>,
    pub columns: Vec<Vec<f64>>,
}

impl SignalFrame {
    /// Align signals onto the timestamps of the longest one.
    ///
    /// Ties on length go to the first signal in the given order.
    pub fn from_signals(signals: &[&Signal]) -> Self {
        let mut longest: &[f64] = &[];
        for signal in signals {
            if signal.timestamps.len() > longest.len() {
                longest = &signal.timestamps;
            }
        }
        Self::aligned_to(signals, longest)
    }

    /// Align signals onto an explicit index
    pub fn aligned_to(signals: &[&Signal], index: &[f64]) -> Self {
        Self {
            index: index.to_vec(),
            keys: signals.iter().map(|s| s.key).collect(),
            columns: signals
                .iter()
                .map(|s| reindex_nearest(&s.timestamps, &s.values, index))
                .collect(),
        }
    }

    /// Rows whose timestamp lies within `[start, end]`
    pub fn window(&self, start: f64, end: f64) -> Self {
        let rows: Vec<usize> = (0..self.index.len())
            .filter(|&i| self.index[i] >= start && self.index[i] <= end)
            .collect();
        Self {
            index: rows.iter().map(|&i| self.index[i]).collect(),
            keys: self.keys.clone(),
            columns: self
                .columns
                .iter()
                .map(|column| rows.iter().map(|&i| column[i]).collect())
                .collect(),
        }
    }

    pub fn column(&self, key: &SignalKey) -> Option<&[f64]> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Resample `values` (observed at ascending `timestamps`) onto `target`.
///
/// Each target instant takes the value of the closest observation; when two
/// observations are equally close the later one wins.
pub fn reindex_nearest(timestamps: &[f64], values: &[f64], target: &[f64]) -> Vec<f64> {
    if timestamps.is_empty() {
        return vec![f64::NAN; target.len()];
    }

    target
        .iter()
        .map(|&t| {
            let right = timestamps.partition_point(|&ts| ts < t);
            let index = if right == 0 {
                0
            } else if right == timestamps.len() {
                right - 1
            } else if (t - timestamps[right - 1]) < (timestamps[right] - t) {
                right - 1
            } else {
                right
            };
            values[index]
        })
        .collect()
}

/// Non-static signals sorted by key
pub fn non_static_signals(signals: &SignalMap) -> Vec<&Signal> {
    signals
        .values()
        .flat_map(|by_key| by_key.values())
        .filter(|s| !s.is_static)
        .collect()
}

/// Highest-entropy share of the non-static signals, returned in key order.
///
/// The subset holds `round(n * fraction)` signals (ties rounded to even);
/// entropy ties are broken by key so the selection is reproducible.
pub fn subset_selection(signals: &SignalMap, fraction: f64) -> Vec<&Signal> {
    let mut candidates = non_static_signals(signals);
    let size = (candidates.len() as f64 * fraction).round_ties_even() as usize;

    candidates.sort_by(|a, b| {
        b.shannon_index
            .total_cmp(&a.shannon_index)
            .then_with(|| a.key.cmp(&b.key))
    });
    candidates.truncate(size);
    candidates.sort_by_key(|s| s.key);

    log::info!("Selected {} highest-entropy signal(s) for clustering", candidates.len());
    candidates
}
