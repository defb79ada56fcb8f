//! Token to time series conversion and the entropy filter

use crate::normalize::NormalizeStrategy;
use crate::types::{BitMatrix, Channel, Signal, SignalKey, Token};
use std::collections::BTreeMap;

/// Concatenate a token's bits (MSB first) into one unsigned value per row
pub fn token_values(matrix: &BitMatrix, token: &Token) -> Vec<u64> {
    (0..matrix.rows())
        .map(|row| {
            (token.start_bit..=token.stop_bit)
                .fold(0u64, |acc, column| (acc << 1) | u64::from(matrix.get(row, column)))
        })
        .collect()
}

/// Shannon index (base 10) of a discrete value distribution
pub fn shannon_index(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    // Ordered counts keep the floating point sum reproducible
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(*value).or_insert(0) += 1;
    }

    let n = values.len() as f64;
    let si: f64 = counts
        .values()
        .map(|&count| {
            let p_i = count as f64 / n;
            p_i * p_i.log10()
        })
        .sum();
    // -0.0 for single-valued series
    (-si).max(0.0)
}

/// Build one signal per token of a non-static channel
pub fn generate_signals(
    channel: &Channel,
    normalization: NormalizeStrategy,
    entropy_epsilon: f64,
) -> BTreeMap<SignalKey, Signal> {
    let mut signals = BTreeMap::new();
    if channel.is_static {
        return signals;
    }

    for token in &channel.tokens {
        let key = SignalKey::new(channel.id, token.start_bit, token.stop_bit);
        let raw = token_values(&channel.bit_matrix, token);

        // Entropy must see the raw cardinality, before any rescaling
        let shannon_index = shannon_index(&raw);
        let is_static = shannon_index < entropy_epsilon;

        let mut values: Vec<f64> = raw.iter().map(|&v| v as f64).collect();
        normalization.apply(&mut values);

        log::trace!("Signal {} has Shannon index {:.4}", key, shannon_index);
        signals.insert(
            key,
            Signal {
                key,
                timestamps: channel.timestamps.clone(),
                values,
                shannon_index,
                is_static,
                known_label: None,
                known_correlation: None,
            },
        );
    }

    signals
}
