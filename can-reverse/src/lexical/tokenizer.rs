//! Greedy bit-position clustering
//!
//! Bits of one numeric field flip at rates that grow (or shrink) monotonically
//! from the most significant to the least significant bit. The tokenizer walks
//! the TANG once and cuts a new token wherever that monotonic run breaks.

use crate::config::AnalysisConfig;
use crate::types::{ByteOrder, Channel, Token};

/// Tokens and padding bits found in one TANG
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    pub tokens: Vec<Token>,
    pub padding: Vec<usize>,
}

/// Thresholds that drive [`get_composition`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenizerParams {
    pub padding_epsilon: f64,
    pub inversion_tolerance: f64,
    pub include_padding: bool,
}

impl TokenizerParams {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            padding_epsilon: config.padding_epsilon,
            inversion_tolerance: config.inversion_tolerance,
            include_padding: config.include_padding,
        }
    }
}

/// Split a TANG vector into contiguous tokens
pub fn get_composition(tang: &[f64], params: TokenizerParams) -> Composition {
    let mut composition = Composition::default();
    // (start bit, byte order) of the token being grown
    let mut open: Option<(usize, ByteOrder)> = None;
    let mut last_value = 0.0;

    for (i, &value) in tang.iter().enumerate() {
        if value <= params.padding_epsilon {
            composition.padding.push(i);
            if !params.include_padding {
                if let Some((start, order)) = open.take() {
                    composition.tokens.push(Token::new(start, i - 1, order));
                    last_value = value;
                }
                continue;
            }
        }

        open = match open {
            None => Some((i, ByteOrder::default())),
            Some((start, _)) if start + 1 == i => {
                // Second bit of the token fixes its byte order
                let order = if value >= last_value {
                    ByteOrder::BigEndian
                } else {
                    ByteOrder::LittleEndian
                };
                Some((start, order))
            }
            Some((start, order)) => {
                let monotonic = match order {
                    ByteOrder::BigEndian => value >= last_value,
                    ByteOrder::LittleEndian => value <= last_value,
                };
                if monotonic || (value - last_value).abs() <= params.inversion_tolerance {
                    Some((start, order))
                } else {
                    log::trace!(
                        "Inversion at bit {} ({:.3} after {:.3}), closing token {}..={}",
                        i,
                        value,
                        last_value,
                        start,
                        i - 1
                    );
                    composition.tokens.push(Token::new(start, i - 1, order));
                    Some((i, ByteOrder::default()))
                }
            }
        };
        last_value = value;
    }

    if let Some((start, order)) = open {
        composition.tokens.push(Token::new(start, tang.len() - 1, order));
    }

    composition
}

/// Merge bit-contiguous neighbours whose boundary TANG values are close.
///
/// Every boundary is compared exactly once, left to right. Because a merged token
/// ends where its right half ended, runs of close boundaries collapse in one sweep.
pub fn merge_tokens(tokens: &[Token], tang: &[f64], max_distance: f64) -> Vec<Token> {
    let mut merged: Vec<Token> = Vec::with_capacity(tokens.len());

    for token in tokens {
        if let Some(last) = merged.last_mut() {
            if last.stop_bit + 1 == token.start_bit
                && (tang[last.stop_bit] - tang[token.start_bit]).abs() <= max_distance
            {
                log::trace!(
                    "Merging {}..={} with {}..={}",
                    last.start_bit,
                    last.stop_bit,
                    token.start_bit,
                    token.stop_bit
                );
                last.stop_bit = token.stop_bit;
                continue;
            }
        }
        merged.push(*token);
    }

    merged
}

/// Tokenize (and optionally merge) one channel in place
pub fn tokenize_channel(channel: &mut Channel, config: &AnalysisConfig) {
    if channel.is_static {
        channel.tokens.clear();
        channel.padding.clear();
        return;
    }

    let composition = get_composition(&channel.tang, TokenizerParams::from_config(config));
    channel.padding = composition.padding;
    channel.tokens = composition.tokens;

    if config.merge_tokens && channel.tokens.len() >= 2 {
        let before = channel.tokens.len();
        channel.tokens = merge_tokens(&channel.tokens, &channel.tang, config.merge_tolerance);
        log::debug!(
            "Channel 0x{:X}: {} token(s), {} after merging",
            channel.id,
            before,
            channel.tokens.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(inversion_tolerance: f64, include_padding: bool) -> TokenizerParams {
        TokenizerParams {
            padding_epsilon: 0.000001,
            inversion_tolerance,
            include_padding,
        }
    }

    fn spans(tokens: &[Token]) -> Vec<(usize, usize)> {
        tokens.iter().map(|t| (t.start_bit, t.stop_bit)).collect()
    }

    #[test]
    fn test_increasing_run_is_big_endian() {
        let tang = [0.1, 0.2, 0.4, 0.8];
        let comp = get_composition(&tang, params(0.0, true));
        assert_eq!(spans(&comp.tokens), vec![(0, 3)]);
        assert_eq!(comp.tokens[0].byte_order, ByteOrder::BigEndian);
    }

    #[test]
    fn test_decreasing_run_is_little_endian() {
        let tang = [0.9, 0.6, 0.3, 0.1];
        let comp = get_composition(&tang, params(0.0, true));
        assert_eq!(spans(&comp.tokens), vec![(0, 3)]);
        assert_eq!(comp.tokens[0].byte_order, ByteOrder::LittleEndian);
    }

    #[test]
    fn test_inversion_splits_token() {
        // Two counters side by side: 0.1 -> 1.0, then restart at 0.1
        let tang = [0.1, 0.3, 0.6, 1.0, 0.1, 0.3, 0.6, 1.0];
        let comp = get_composition(&tang, params(0.0, true));
        assert_eq!(spans(&comp.tokens), vec![(0, 3), (4, 7)]);
    }

    #[test]
    fn test_inversion_tolerance_absorbs_noise() {
        let tang = [0.1, 0.3, 0.25, 0.6];
        assert_eq!(spans(&get_composition(&tang, params(0.0, true)).tokens), vec![(0, 1), (2, 3)]);
        assert_eq!(spans(&get_composition(&tang, params(0.1, true)).tokens), vec![(0, 3)]);
    }

    #[test]
    fn test_padding_closes_token() {
        let tang = [0.2, 0.5, 0.0, 0.0, 0.3, 0.9];
        let excluded = get_composition(&tang, params(0.0, false));
        assert_eq!(spans(&excluded.tokens), vec![(0, 1), (4, 5)]);
        assert_eq!(excluded.padding, vec![2, 3]);

        let included = get_composition(&tang, params(0.0, true));
        assert_eq!(included.padding, vec![2, 3]);
        assert_eq!(spans(&included.tokens), vec![(0, 1), (2, 5)]);
    }

    #[test]
    fn test_all_zero_tang_without_padding() {
        let comp = get_composition(&[0.0; 16], params(0.2, false));
        assert!(comp.tokens.is_empty());
        assert_eq!(comp.padding.len(), 16);
    }

    #[test]
    fn test_tokenizer_is_idempotent() {
        let tang = [0.0, 0.4, 0.2, 0.9, 0.9, 0.1, 0.0, 0.5];
        let a = get_composition(&tang, params(0.1, false));
        let b = get_composition(&tang, params(0.1, false));
        assert_eq!(a, b);
    }

    #[test]
    fn test_merge_close_boundaries() {
        let tang = [0.1, 0.5, 0.45, 0.9, 0.1, 0.2];
        let tokens = vec![
            Token::new(0, 1, ByteOrder::BigEndian),
            Token::new(2, 3, ByteOrder::BigEndian),
            Token::new(4, 5, ByteOrder::BigEndian),
        ];
        let merged = merge_tokens(&tokens, &tang, 0.1);
        assert_eq!(spans(&merged), vec![(0, 3), (4, 5)]);
    }

    #[test]
    fn test_merge_chains_in_one_sweep() {
        let tang = [0.5, 0.5, 0.5, 0.5];
        let tokens: Vec<Token> = (0..4).map(|i| Token::new(i, i, ByteOrder::BigEndian)).collect();
        assert_eq!(spans(&merge_tokens(&tokens, &tang, 0.0)), vec![(0, 3)]);
    }

    #[test]
    fn test_merge_skips_non_adjacent() {
        let tang = [0.5, 0.5, 0.0, 0.5, 0.5];
        let tokens = vec![
            Token::new(0, 1, ByteOrder::BigEndian),
            Token::new(3, 4, ByteOrder::BigEndian),
        ];
        assert_eq!(merge_tokens(&tokens, &tang, 1.0), tokens);
    }

    #[test]
    fn test_merge_rerun_is_stable() {
        let tang = [0.1, 0.9, 0.2, 0.8, 0.85, 0.1];
        let tokens = get_composition(&tang, params(0.0, true)).tokens;
        let once = merge_tokens(&tokens, &tang, 0.1);
        let twice = merge_tokens(&once, &tang, 0.1);
        assert_eq!(once, twice);
    }
}
