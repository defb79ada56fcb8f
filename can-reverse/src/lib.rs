//! CAN Reverse Engineering Library
//!
//! Unsupervised inference of signal layouts from unlabeled CAN traffic. Given
//! timestamped frames, the library hypothesizes which bit ranges of each
//! arbitration ID hold independent sub-signals and which of those signals are
//! physically related across IDs.
//!
//! # Architecture
//!
//! The pipeline is batch and runs strictly downstream:
//! - Lexical analysis: payload bytes → bit matrix → TANG (per-bit transition
//!   counts) → tokens (greedy bit-range clustering, then merging)
//! - Signal synthesis: token bits → scalar time series, Shannon index, static filter
//! - Semantic analysis: correlation of the highest-entropy signals, greedy
//!   (optionally fuzzy) clustering, label propagation to the remaining signals
//! - Calibration: k-fold search for the tokenizer thresholds
//!
//! The library does NOT:
//! - Parse log files (records are handed in already decoded)
//! - Decode diagnostic PIDs (known signals are handed in as time series)
//! - Plot or persist anything
//!
//! # Example Usage
//!
//! ```no_run
//! use can_reverse::{AnalysisConfig, Analyzer, CanRecord};
//!
//! let records = vec![
//!     CanRecord::new(0.00, 0x1A0, vec![0x00, 0x10]),
//!     CanRecord::new(0.01, 0x1A0, vec![0x01, 0x10]),
//! ];
//!
//! let config = AnalysisConfig::new()
//!     .with_correlation_threshold(0.85)
//!     .with_fuzzy_labeling(true);
//!
//! let analyzer = Analyzer::new(config);
//! let report = analyzer.analyze(&records).unwrap();
//!
//! for (label, members) in &report.clusters {
//!     println!("Cluster {}: {} signal(s)", label, members.len());
//! }
//! ```

// Public modules
pub mod analyzer;
pub mod calibration;
pub mod config;
pub mod frequency;
pub mod lexical;
pub mod normalize;
pub mod preprocess;
pub mod semantic;
pub mod types;

// Re-export main types for convenience
pub use analyzer::{AnalysisReport, Analyzer};
pub use calibration::CalibrationResult;
pub use config::AnalysisConfig;
pub use normalize::NormalizeStrategy;
pub use semantic::{ClusterMap, CorrelationMatrix, KnownMatch};
pub use types::{
    AnalysisError, BitMatrix, ByteOrder, CanRecord, Channel, ChannelMap, FrequencyStats,
    KnownSignal, Result, Signal, SignalKey, SignalMap, Token,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
