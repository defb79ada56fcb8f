//! Main analysis API
//!
//! The Analyzer owns a configuration and runs the pipeline stages in order:
//! channel construction, tokenization, signal synthesis, subset clustering,
//! label propagation and (optionally) known-signal labeling. Each stage is also
//! exposed on its own so callers can inspect or replace intermediate results.

use crate::calibration::{k_fold_threshold_selection, CalibrationResult};
use crate::config::AnalysisConfig;
use crate::lexical::{generate_signals, tokenize_channel};
use crate::preprocess::generate_channel_map;
use crate::semantic::{
    greedy_signal_clustering, known_signal_labeling, label_propagation, non_static_signals,
    remove_singleton_clusters, subset_selection, validate_clusters, ClusterMap, CorrelationMatrix,
    KnownMatch, SignalFrame,
};
use crate::types::{CanRecord, ChannelMap, KnownSignal, Result, SignalMap};
use rayon::prelude::*;

/// Everything one analysis run produces
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub channels: ChannelMap,
    pub signals: SignalMap,
    /// Correlation over the high-entropy subset that seeded clustering
    pub subset_correlation: CorrelationMatrix,
    /// Correlation over every non-static signal, used for propagation
    pub full_correlation: CorrelationMatrix,
    pub clusters: ClusterMap,
    pub known_matches: Vec<KnownMatch>,
    pub calibration: Option<CalibrationResult>,
}

impl AnalysisReport {
    pub fn signal_count(&self) -> usize {
        self.signals.values().map(|by_key| by_key.len()).sum()
    }

    pub fn non_static_signal_count(&self) -> usize {
        non_static_signals(&self.signals).len()
    }
}

/// The analyzer - entry point for a whole-capture analysis
pub struct Analyzer {
    config: AnalysisConfig,
    known_signals: Vec<KnownSignal>,
}

impl Analyzer {
    /// Create an analyzer with the given configuration
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            known_signals: Vec::new(),
        }
    }

    /// Builder method: known signals to match discovered signals against
    pub fn with_known_signals(mut self, known_signals: Vec<KnownSignal>) -> Self {
        self.known_signals = known_signals;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Group records into channels with bit matrices, TANGs and timing statistics
    pub fn build_channels(&self, records: &[CanRecord]) -> Result<ChannelMap> {
        generate_channel_map(records, &self.config)
    }

    /// Tokenize every channel in place
    pub fn tokenize(&self, channels: &mut ChannelMap) {
        channels
            .par_iter_mut()
            .for_each(|(_, channel)| tokenize_channel(channel, &self.config));

        let tokens: usize = channels.values().map(|c| c.tokens.len()).sum();
        log::info!("Tokenized {} channel(s) into {} token(s)", channels.len(), tokens);
    }

    /// Synthesize one signal per token
    pub fn generate_signals(&self, channels: &ChannelMap) -> SignalMap {
        let signals: SignalMap = channels
            .par_iter()
            .map(|(id, channel)| {
                (
                    *id,
                    generate_signals(
                        channel,
                        self.config.signal_normalization,
                        self.config.entropy_epsilon,
                    ),
                )
            })
            .filter(|(_, by_key)| !by_key.is_empty())
            .collect();

        log::info!(
            "Generated {} signal(s), {} non-static",
            signals.values().map(|s| s.len()).sum::<usize>(),
            non_static_signals(&signals).len()
        );
        signals
    }

    /// Correlate the high-entropy subset and cluster it
    pub fn cluster(&self, signals: &SignalMap) -> Result<(CorrelationMatrix, ClusterMap)> {
        let subset = subset_selection(signals, self.config.subset_fraction);
        let frame = SignalFrame::from_signals(&subset);
        let matrix = CorrelationMatrix::from_frame(&frame).drop_undefined();
        let clusters = greedy_signal_clustering(
            &matrix,
            self.config.correlation_threshold,
            self.config.fuzzy_labeling,
        )?;
        Ok((matrix, clusters))
    }

    /// Extend clusters over every non-static signal.
    ///
    /// Returns the aligned frame of all non-static signals and its correlation.
    pub fn propagate(
        &self,
        signals: &SignalMap,
        clusters: &mut ClusterMap,
    ) -> Result<(SignalFrame, CorrelationMatrix)> {
        let population = non_static_signals(signals);
        let frame = SignalFrame::from_signals(&population);
        let matrix = CorrelationMatrix::from_frame(&frame).drop_undefined();
        label_propagation(&matrix, clusters, self.config.correlation_threshold)?;
        Ok((frame, matrix))
    }

    /// Cross-validate tokenizer thresholds on the given channels
    pub fn calibrate(&self, channels: &ChannelMap) -> Result<CalibrationResult> {
        k_fold_threshold_selection(channels, &self.config)
    }

    /// Run the whole pipeline (without calibration)
    pub fn analyze(&self, records: &[CanRecord]) -> Result<AnalysisReport> {
        self.config.validate()?;

        log::info!("Lexical analysis");
        let mut channels = self.build_channels(records)?;
        self.tokenize(&mut channels);
        let mut signals = self.generate_signals(&channels);

        log::info!("Semantic analysis");
        let (subset_correlation, mut clusters) = self.cluster(&signals)?;
        let (frame, full_correlation) = self.propagate(&signals, &mut clusters)?;
        validate_clusters(&clusters, &signals)?;
        remove_singleton_clusters(&mut clusters);

        let known_matches = if self.known_signals.is_empty() {
            Vec::new()
        } else {
            known_signal_labeling(
                &frame,
                &self.known_signals,
                &mut signals,
                self.config.correlation_threshold,
            )?
        };

        Ok(AnalysisReport {
            channels,
            signals,
            subset_correlation,
            full_correlation,
            clusters,
            known_matches,
            calibration: None,
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}
