//! Cross-validated selection of the tokenizer thresholds
//!
//! A good (inversion, merge) pair tokenizes two disjoint samples of the same
//! channel the same way. Each channel's rows are split into k contiguous folds;
//! the training and held-out TANGs are tokenized over the whole threshold grid and
//! the resulting token borders compared with the alignment score.

use crate::config::AnalysisConfig;
use crate::lexical::{get_composition, merge_tokens, transition_counts, TokenizerParams};
use crate::types::{AnalysisError, Channel, ChannelMap, Result, Token};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;

/// Averaged score grid and the thresholds it selects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationResult {
    /// Inversion tolerances, one per score matrix row
    pub inversion_values: Vec<f64>,
    /// Merge tolerances, one per score matrix column
    pub merge_values: Vec<f64>,
    /// Alignment score averaged over folds, then channels
    pub score_matrix: Vec<Vec<f64>>,
    pub optimal_inversion_index: usize,
    pub optimal_merge_index: usize,
    pub optimal_inversion: f64,
    pub optimal_merge: f64,
    /// Number of channels that contributed to the average
    pub channels_scored: usize,
}

/// Bit positions just before a token boundary, excluding the payload edges
pub fn borders(token: &Token, last_index: usize) -> Vec<usize> {
    let mut result = Vec::with_capacity(2);
    if token.start_bit != 0 {
        result.push(token.start_bit - 1);
    }
    if token.stop_bit != last_index {
        result.push(token.stop_bit);
    }
    result
}

/// 1 - mismatch / (bit_width - 1): 1 for identical borders, 0 for total mismatch
pub fn alignment_score(mismatch: usize, bit_width: usize) -> f64 {
    if bit_width < 2 {
        return 1.0;
    }
    1.0 - mismatch as f64 / (bit_width - 1) as f64
}

fn border_set(tokens: &[Token], bit_width: usize) -> BTreeSet<usize> {
    tokens
        .iter()
        .flat_map(|t| borders(t, bit_width - 1))
        .collect()
}

/// Alignment score of two token lists over the same payload width
pub fn token_alignment_score(a: &[Token], b: &[Token], bit_width: usize) -> f64 {
    if bit_width == 0 {
        return 1.0;
    }
    let a = border_set(a, bit_width);
    let b = border_set(b, bit_width);
    alignment_score(a.symmetric_difference(&b).count(), bit_width)
}

/// Tokenize two TANGs with the same thresholds and score their agreement
pub fn train_test_alignment_score(
    tang_a: &[f64],
    tang_b: &[f64],
    max_inversion: f64,
    max_merge: f64,
    padding_epsilon: f64,
) -> f64 {
    let params = TokenizerParams {
        padding_epsilon,
        inversion_tolerance: max_inversion,
        include_padding: true,
    };
    let comp_a = merge_tokens(&get_composition(tang_a, params).tokens, tang_a, max_merge);
    let comp_b = merge_tokens(&get_composition(tang_b, params).tokens, tang_b, max_merge);
    token_alignment_score(&comp_a, &comp_b, tang_a.len())
}

/// Contiguous k-fold split of `rows` indices: (train, test) per fold.
///
/// The first `rows % k` folds hold one extra row.
pub fn k_fold_splits(rows: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    if k == 0 || rows < k {
        return Vec::new();
    }

    let mut splits = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = rows / k + usize::from(fold < rows % k);
        let test: Vec<usize> = (start..start + size).collect();
        let train: Vec<usize> = (0..start).chain(start + size..rows).collect();
        splits.push((train, test));
        start += size;
    }
    splits
}

/// Fold-averaged score grid of one channel, or None if it cannot be split
pub fn channel_score_matrix(
    channel: &Channel,
    inversion_values: &[f64],
    merge_values: &[f64],
    config: &AnalysisConfig,
) -> Option<Vec<Vec<f64>>> {
    let splits = k_fold_splits(channel.bit_matrix.rows(), config.k_folds);
    if splits.is_empty() {
        log::warn!(
            "Channel 0x{:X}: {} row(s) cannot be split into {} folds",
            channel.id,
            channel.bit_matrix.rows(),
            config.k_folds
        );
        return None;
    }

    let mut average = vec![vec![0.0; merge_values.len()]; inversion_values.len()];
    let bit_width = channel.bit_matrix.width();

    for (train, test) in &splits {
        let train_tang = transition_counts(&channel.bit_matrix, train);
        let test_tang = transition_counts(&channel.bit_matrix, test);

        for (m, &inversion) in inversion_values.iter().enumerate() {
            let params = TokenizerParams {
                padding_epsilon: config.padding_epsilon,
                inversion_tolerance: inversion,
                include_padding: true,
            };
            // Tokenization only depends on the inversion tolerance
            let train_tokens = get_composition(&train_tang, params).tokens;
            let test_tokens = get_composition(&test_tang, params).tokens;

            for (n, &merge) in merge_values.iter().enumerate() {
                let a = merge_tokens(&train_tokens, &train_tang, merge);
                let b = merge_tokens(&test_tokens, &test_tang, merge);
                average[m][n] += token_alignment_score(&a, &b, bit_width);
            }
        }
    }

    let folds = splits.len() as f64;
    for row in average.iter_mut() {
        for score in row.iter_mut() {
            *score /= folds;
        }
    }
    Some(average)
}

/// Run the k-fold threshold search over every non-static, non-short channel
pub fn k_fold_threshold_selection(channels: &ChannelMap, config: &AnalysisConfig) -> Result<CalibrationResult> {
    config.validate()?;
    let grid = config.grid_values();

    let candidates: Vec<&Channel> = channels
        .values()
        .filter(|c| !c.is_static && !c.is_short)
        .collect();
    log::info!(
        "Calibrating on {} channel(s) over a {}x{} grid with {} folds",
        candidates.len(),
        grid.len(),
        grid.len(),
        config.k_folds
    );

    let per_channel: Vec<Vec<Vec<f64>>> = candidates
        .par_iter()
        .filter_map(|channel| {
            log::debug!(
                "Scoring channel 0x{:X} ({} observations)",
                channel.id,
                channel.observations()
            );
            channel_score_matrix(channel, &grid, &grid, config)
        })
        .collect();

    if per_channel.is_empty() {
        return Err(AnalysisError::NoCalibrationCandidates);
    }

    let mut score_matrix = vec![vec![0.0; grid.len()]; grid.len()];
    for matrix in &per_channel {
        for (total_row, row) in score_matrix.iter_mut().zip(matrix) {
            for (total, score) in total_row.iter_mut().zip(row) {
                *total += score;
            }
        }
    }
    let count = per_channel.len() as f64;
    for row in score_matrix.iter_mut() {
        for score in row.iter_mut() {
            *score /= count;
        }
    }

    // First maximum in row-major order
    let mut best = (0, 0);
    for (m, row) in score_matrix.iter().enumerate() {
        for (n, &score) in row.iter().enumerate() {
            if score > score_matrix[best.0][best.1] {
                best = (m, n);
            }
        }
    }

    log::info!(
        "Calibrated thresholds: inversion {:.2}, merge {:.2} (score {:.4})",
        grid[best.0],
        grid[best.1],
        score_matrix[best.0][best.1]
    );

    Ok(CalibrationResult {
        inversion_values: grid.clone(),
        merge_values: grid.clone(),
        optimal_inversion_index: best.0,
        optimal_merge_index: best.1,
        optimal_inversion: grid[best.0],
        optimal_merge: grid[best.1],
        score_matrix,
        channels_scored: per_channel.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ByteOrder;

    fn token(start: usize, stop: usize) -> Token {
        Token::new(start, stop, ByteOrder::BigEndian)
    }

    #[test]
    fn test_borders() {
        assert_eq!(borders(&token(0, 7), 7), Vec::<usize>::new());
        assert_eq!(borders(&token(0, 3), 7), vec![3]);
        assert_eq!(borders(&token(4, 7), 7), vec![3]);
        assert_eq!(borders(&token(2, 5), 7), vec![1, 5]);
    }

    #[test]
    fn test_identical_tokens_score_one() {
        let tokens = vec![token(0, 3), token(4, 9), token(10, 15)];
        assert_eq!(token_alignment_score(&tokens, &tokens, 16), 1.0);
    }

    #[test]
    fn test_disjoint_borders_score() {
        // borders {3} vs {7}: two mismatches over 16 bits
        let a = vec![token(0, 3), token(4, 15)];
        let b = vec![token(0, 7), token(8, 15)];
        let score = token_alignment_score(&a, &b, 16);
        assert!(score < 1.0);
        assert!((score - (1.0 - 2.0 / 15.0)).abs() < 1e-12);
    }

    #[test]
    fn test_k_fold_splits() {
        let splits = k_fold_splits(7, 3);
        assert_eq!(splits.len(), 3);
        assert_eq!(splits[0].1, vec![0, 1, 2]);
        assert_eq!(splits[1].1, vec![3, 4]);
        assert_eq!(splits[2].1, vec![5, 6]);
        assert_eq!(splits[1].0, vec![0, 1, 2, 5, 6]);
        assert!(k_fold_splits(2, 3).is_empty());
    }

    #[test]
    fn test_train_test_alignment_identical_tangs() {
        let tang = [0.1, 0.2, 0.4, 0.8, 0.1, 0.2, 0.4, 0.8];
        assert_eq!(train_test_alignment_score(&tang, &tang, 0.0, 0.0, 0.000001), 1.0);
    }
}
