//! Bit matrix expansion and TANG computation
//!
//! Payload byte `j` occupies columns `[j*8, j*8+8)`, most significant bit first.
//! The TANG (transition aggregation n-gram) counts, per column, how often the bit
//! flipped between consecutive observations.

use crate::normalize::NormalizeStrategy;
use crate::types::{AnalysisError, BitMatrix, Channel, Result};

/// Expand payload rows into a boolean matrix of `dlc * 8` columns
pub fn build_bit_matrix(payloads: &[Vec<u8>], dlc: usize) -> Result<BitMatrix> {
    let width = dlc * 8;
    let mut bits = Vec::with_capacity(payloads.len() * width);

    for (row, payload) in payloads.iter().enumerate() {
        if payload.len() < dlc {
            return Err(AnalysisError::InvalidData(format!(
                "row {} has {} bytes but dlc is {}",
                row,
                payload.len(),
                dlc
            )));
        }
        for byte in &payload[..dlc] {
            for shift in (0..8).rev() {
                bits.push((byte >> shift) & 0x01 == 1);
            }
        }
    }

    BitMatrix::from_bits(payloads.len(), width, bits)
}

/// Reassemble the payload bytes of one matrix row
pub fn row_to_bytes(matrix: &BitMatrix, row: usize) -> Vec<u8> {
    matrix
        .row(row)
        .chunks(8)
        .map(|byte_bits| {
            byte_bits
                .iter()
                .fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit))
        })
        .collect()
}

/// Raw transition counts over the given rows, taken in the order listed.
///
/// Returns an all-zero vector when fewer than two rows are given.
pub fn transition_counts(matrix: &BitMatrix, rows: &[usize]) -> Vec<f64> {
    let mut tang = vec![0.0; matrix.width()];
    for pair in rows.windows(2) {
        let (previous, current) = (matrix.row(pair[0]), matrix.row(pair[1]));
        for (count, (a, b)) in tang.iter_mut().zip(previous.iter().zip(current)) {
            if a != b {
                *count += 1.0;
            }
        }
    }
    tang
}

/// Fill in the bit matrix, TANG and static/short flags of a channel
pub fn generate_bit_matrix_and_tang(
    channel: &mut Channel,
    normalization: NormalizeStrategy,
    min_observations: usize,
) -> Result<()> {
    channel.bit_matrix = build_bit_matrix(&channel.payloads, channel.dlc)?;
    channel.is_short = channel.observations() < min_observations;
    channel.is_static = true;
    channel.tang.clear();

    if channel.bit_matrix.rows() < 2 {
        log::debug!(
            "Channel 0x{:X} has {} observation(s), no TANG",
            channel.id,
            channel.bit_matrix.rows()
        );
        return Ok(());
    }

    let rows: Vec<usize> = (0..channel.bit_matrix.rows()).collect();
    channel.tang = transition_counts(&channel.bit_matrix, &rows);

    let max = channel.tang.iter().cloned().fold(0.0, f64::max);
    if max > 0.0 {
        normalization.apply(&mut channel.tang);
        channel.is_static = false;
    } else {
        log::debug!("Channel 0x{:X} never transitioned, marked static", channel.id);
    }

    Ok(())
}
