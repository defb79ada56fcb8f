//! Core types for the CAN reverse engineering library
//!
//! This module defines the records the analysis consumes and the plain data
//! structures every pipeline stage enriches: channels (one per arbitration ID),
//! signals (one per token) and the keys that tie them together.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// All channels of a capture, ordered by arbitration ID
pub type ChannelMap = BTreeMap<u32, Channel>;

/// Signals grouped by the arbitration ID that carries them
pub type SignalMap = BTreeMap<u32, BTreeMap<SignalKey, Signal>>;

/// Errors that can occur during analysis
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Cluster {label} references signal {key} which is not in the signal map")]
    InconsistentCluster { label: usize, key: SignalKey },

    #[error("Cluster label {0} is not allocated")]
    UnknownClusterLabel(usize),

    #[error("Signal {0} is not in the signal map")]
    UnknownSignal(SignalKey),

    #[error("No channel qualified for threshold calibration")]
    NoCalibrationCandidates,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A single CAN message handed over by the ingestion layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanRecord {
    /// Capture time in seconds
    pub timestamp: f64,
    /// CAN arbitration ID (11-bit or 29-bit)
    pub arbitration_id: u32,
    /// Data length code (0-8)
    pub dlc: u8,
    /// Payload bytes, at least `dlc` of them
    pub data: Vec<u8>,
}

impl CanRecord {
    /// Create a record whose DLC is the payload length
    pub fn new(timestamp: f64, arbitration_id: u32, data: Vec<u8>) -> Self {
        Self {
            timestamp,
            arbitration_id,
            dlc: data.len() as u8,
            data,
        }
    }
}

/// Bit order a token's transition counts suggest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Transition frequency grows towards the end of the token (Motorola-like)
    #[default]
    BigEndian,
    /// Transition frequency shrinks towards the end of the token (Intel-like)
    LittleEndian,
}

/// A contiguous, inclusive bit range hypothesized to hold one sub-signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub start_bit: usize,
    pub stop_bit: usize,
    pub byte_order: ByteOrder,
}

impl Token {
    pub fn new(start_bit: usize, stop_bit: usize, byte_order: ByteOrder) -> Self {
        Self {
            start_bit,
            stop_bit,
            byte_order,
        }
    }

    /// Number of bits covered by the token
    pub fn width(&self) -> usize {
        self.stop_bit - self.start_bit + 1
    }
}

/// Bit matrix of a channel: one row per observation, one column per payload bit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitMatrix {
    rows: usize,
    width: usize,
    bits: Vec<bool>,
}

impl BitMatrix {
    /// Create a matrix from row-major bits
    pub fn from_bits(rows: usize, width: usize, bits: Vec<bool>) -> Result<Self> {
        if bits.len() != rows * width {
            return Err(AnalysisError::InvalidData(format!(
                "bit matrix of {}x{} needs {} bits, got {}",
                rows,
                width,
                rows * width,
                bits.len()
            )));
        }
        Ok(Self { rows, width, bits })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, index: usize) -> &[bool] {
        &self.bits[index * self.width..(index + 1) * self.width]
    }

    pub fn get(&self, row: usize, column: usize) -> bool {
        self.bits[row * self.width + column]
    }
}

/// Transmission timing statistics of a channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyStats {
    /// z value the confidence interval was computed with
    pub ci_sensitivity: f64,
    /// Mean interval between messages (converted units, ms by default)
    pub freq_mean: f64,
    /// Sample standard deviation of the interval
    pub freq_std: f64,
    /// Confidence interval around the mean
    pub freq_ci: (f64, f64),
    /// Width of the confidence interval relative to the mean
    pub mean_to_ci_ratio: f64,
    /// True if the channel looks like a clocked, periodic transmission
    pub synchronous: bool,
}

/// All observed traffic for one arbitration ID
#[derive(Debug, Clone)]
pub struct Channel {
    /// CAN arbitration ID
    pub id: u32,
    /// Payload length in bytes
    pub dlc: usize,
    /// Observation timestamps in seconds, ascending
    pub timestamps: Vec<f64>,
    /// Payload rows aligned with `timestamps`
    pub payloads: Vec<Vec<u8>>,
    /// Expanded payload bits
    pub bit_matrix: BitMatrix,
    /// Transition aggregation n-gram, one entry per bit
    pub tang: Vec<f64>,
    /// No transitions observed (or too few rows to observe any)
    pub is_static: bool,
    /// Too few observations for timing statistics
    pub is_short: bool,
    /// Hypothesized sub-signals, sorted by start bit
    pub tokens: Vec<Token>,
    /// Bit positions that never transitioned
    pub padding: Vec<usize>,
    /// Timing statistics (None for short channels)
    pub frequency: Option<FrequencyStats>,
}

impl Channel {
    /// Number of payload bits
    pub fn bit_width(&self) -> usize {
        self.dlc * 8
    }

    /// Number of observed messages
    pub fn observations(&self) -> usize {
        self.timestamps.len()
    }
}

/// Globally unique signal identifier: (arbitration ID, start bit, stop bit)
///
/// The derived ordering is lexicographic and is the iteration order every
/// clustering pass relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignalKey {
    pub arbitration_id: u32,
    pub start_bit: usize,
    pub stop_bit: usize,
}

impl SignalKey {
    pub fn new(arbitration_id: u32, start_bit: usize, stop_bit: usize) -> Self {
        Self {
            arbitration_id,
            start_bit,
            stop_bit,
        }
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}[{}..={}]", self.arbitration_id, self.start_bit, self.stop_bit)
    }
}

/// Scalar time series reconstructed from one token
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub key: SignalKey,
    /// Timestamps of the owning channel
    pub timestamps: Vec<f64>,
    /// Values, normalized after entropy was captured
    pub values: Vec<f64>,
    /// Shannon index (log10) of the raw value distribution
    pub shannon_index: f64,
    pub is_static: bool,
    /// Name of the known signal this one correlates with
    pub known_label: Option<String>,
    /// Pearson coefficient against `known_label`
    pub known_correlation: Option<f64>,
}

impl Signal {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A named time series decoded by other means (e.g. OBD-II responses)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownSignal {
    pub name: String,
    pub timestamps: Vec<f64>,
    pub values: Vec<f64>,
}
