//! Lexical analysis: payload bits to tokens to signals
//!
//! This module contains the per-channel stages of the pipeline. Every function
//! works on one channel at a time so callers can fan channels out across threads.

pub mod bit_matrix;
pub mod synthesis;
pub mod tokenizer;

// Re-export key functions for convenience
pub use bit_matrix::{build_bit_matrix, generate_bit_matrix_and_tang, row_to_bytes, transition_counts};
pub use synthesis::{generate_signals, shannon_index, token_values};
pub use tokenizer::{get_composition, merge_tokens, tokenize_channel, Composition, TokenizerParams};
