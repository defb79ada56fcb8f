//! Analysis configuration types
//!
//! Every threshold the pipeline uses lives here and is passed explicitly to the
//! stage that needs it. Defaults reproduce the reference pipeline settings.

use crate::normalize::NormalizeStrategy;
use crate::types::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a whole analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// TANG values at or below this are padding bits
    #[serde(default = "default_epsilon")]
    pub padding_epsilon: f64,

    /// Largest TANG drop (or rise) tolerated inside a token
    #[serde(default = "default_tolerance")]
    pub inversion_tolerance: f64,

    /// Largest TANG step across a boundary at which adjacent tokens merge
    #[serde(default = "default_tolerance")]
    pub merge_tolerance: f64,

    /// Let padding bits take part in tokenization
    #[serde(default = "default_true")]
    pub include_padding: bool,

    /// Run the token merger after tokenization
    #[serde(default = "default_true")]
    pub merge_tokens: bool,

    /// Allow a signal to belong to several clusters
    #[serde(default = "default_true")]
    pub fuzzy_labeling: bool,

    /// Minimum rounded Pearson coefficient for two signals to be related
    #[serde(default = "default_correlation_threshold")]
    pub correlation_threshold: f64,

    /// Share of non-static signals (highest entropy first) that seed clustering
    #[serde(default = "default_subset_fraction")]
    pub subset_fraction: f64,

    /// Channels with fewer observations are flagged short
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,

    /// Folds used by the threshold calibrator
    #[serde(default = "default_k_folds")]
    pub k_folds: usize,

    /// Signals with a Shannon index below this are static
    #[serde(default = "default_epsilon")]
    pub entropy_epsilon: f64,

    /// Normalization applied to channel TANG vectors
    #[serde(default)]
    pub tang_normalization: NormalizeStrategy,

    /// Normalization applied to synthesized signal values
    #[serde(default)]
    pub signal_normalization: NormalizeStrategy,

    /// Multiplier turning timestamp seconds into frequency units (1000 = ms)
    #[serde(default = "default_time_convert")]
    pub time_convert: f64,

    /// z value of the transmission interval confidence interval
    #[serde(default = "default_ci_z")]
    pub ci_z: f64,

    /// Largest CI width / mean ratio still considered synchronous
    #[serde(default = "default_synchronous_threshold")]
    pub synchronous_threshold: f64,

    /// Arbitration IDs excluded from analysis (OBD-II request/response by default)
    #[serde(default = "default_ignored_ids")]
    pub ignored_ids: Vec<u32>,

    /// Step of the calibration grid
    #[serde(default = "default_grid_step")]
    pub grid_step: f64,

    /// Largest tolerance of the calibration grid
    #[serde(default = "default_grid_max")]
    pub grid_max: f64,
}

fn default_true() -> bool {
    true
}

fn default_epsilon() -> f64 {
    0.000001
}

fn default_tolerance() -> f64 {
    0.2
}

fn default_correlation_threshold() -> f64 {
    0.85
}

fn default_subset_fraction() -> f64 {
    0.25
}

fn default_min_observations() -> usize {
    4
}

fn default_k_folds() -> usize {
    5
}

fn default_time_convert() -> f64 {
    1000.0
}

fn default_ci_z() -> f64 {
    1.645
}

fn default_synchronous_threshold() -> f64 {
    0.1
}

fn default_ignored_ids() -> Vec<u32> {
    vec![0x7DF, 0x7E8]
}

fn default_grid_step() -> f64 {
    0.01
}

fn default_grid_max() -> f64 {
    1.0
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            padding_epsilon: default_epsilon(),
            inversion_tolerance: default_tolerance(),
            merge_tolerance: default_tolerance(),
            include_padding: true,
            merge_tokens: true,
            fuzzy_labeling: true,
            correlation_threshold: default_correlation_threshold(),
            subset_fraction: default_subset_fraction(),
            min_observations: default_min_observations(),
            k_folds: default_k_folds(),
            entropy_epsilon: default_epsilon(),
            tang_normalization: NormalizeStrategy::MinMax,
            signal_normalization: NormalizeStrategy::MinMax,
            time_convert: default_time_convert(),
            ci_z: default_ci_z(),
            synchronous_threshold: default_synchronous_threshold(),
            ignored_ids: default_ignored_ids(),
            grid_step: default_grid_step(),
            grid_max: default_grid_max(),
        }
    }
}

impl AnalysisConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the inversion tolerance
    pub fn with_inversion_tolerance(mut self, tolerance: f64) -> Self {
        self.inversion_tolerance = tolerance;
        self
    }

    /// Builder method: set the merge tolerance
    pub fn with_merge_tolerance(mut self, tolerance: f64) -> Self {
        self.merge_tolerance = tolerance;
        self
    }

    /// Builder method: include or exclude padding bits from tokens
    pub fn with_padding(mut self, include: bool) -> Self {
        self.include_padding = include;
        self
    }

    /// Builder method: enable or disable the token merger
    pub fn with_merging(mut self, enabled: bool) -> Self {
        self.merge_tokens = enabled;
        self
    }

    /// Builder method: enable or disable fuzzy labeling
    pub fn with_fuzzy_labeling(mut self, enabled: bool) -> Self {
        self.fuzzy_labeling = enabled;
        self
    }

    /// Builder method: set the correlation threshold
    pub fn with_correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = threshold;
        self
    }

    /// Builder method: set the clustering subset fraction
    pub fn with_subset_fraction(mut self, fraction: f64) -> Self {
        self.subset_fraction = fraction;
        self
    }

    /// Builder method: set the number of calibration folds
    pub fn with_k_folds(mut self, folds: usize) -> Self {
        self.k_folds = folds;
        self
    }

    /// Builder method: set the calibration grid
    pub fn with_grid(mut self, step: f64, max: f64) -> Self {
        self.grid_step = step;
        self.grid_max = max;
        self
    }

    /// Builder method: replace the ignored arbitration IDs
    pub fn with_ignored_ids(mut self, ids: Vec<u32>) -> Self {
        self.ignored_ids = ids;
        self
    }

    /// Check if an arbitration ID should be analyzed
    pub fn should_process_id(&self, arbitration_id: u32) -> bool {
        !self.ignored_ids.contains(&arbitration_id)
    }

    /// Tolerance values probed by the calibrator, from 0 up to `grid_max`
    pub fn grid_values(&self) -> Vec<f64> {
        let steps = (self.grid_max / self.grid_step + 1e-9).floor() as usize;
        (0..=steps).map(|i| i as f64 * self.grid_step).collect()
    }

    /// Reject settings no stage can work with
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(AnalysisError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )))
            }
        };
        unit("subset_fraction", self.subset_fraction)?;
        unit("correlation_threshold", self.correlation_threshold.abs())?;

        for (name, value) in [
            ("padding_epsilon", self.padding_epsilon),
            ("inversion_tolerance", self.inversion_tolerance),
            ("merge_tolerance", self.merge_tolerance),
            ("entropy_epsilon", self.entropy_epsilon),
        ] {
            if !(value >= 0.0) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }

        if self.k_folds < 2 {
            return Err(AnalysisError::InvalidConfig(format!(
                "k_folds must be at least 2, got {}",
                self.k_folds
            )));
        }
        if !(self.grid_step > 0.0) || !(self.grid_max >= 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "calibration grid needs a positive step and non-negative max, got step {} max {}",
                self.grid_step, self.grid_max
            )));
        }
        if !(self.time_convert > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "time_convert must be positive, got {}",
                self.time_convert
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_config_builder() {
        let config = AnalysisConfig::new()
            .with_inversion_tolerance(0.1)
            .with_merge_tolerance(0.3)
            .with_padding(false)
            .with_fuzzy_labeling(false)
            .with_correlation_threshold(0.9)
            .with_k_folds(3);

        assert_eq!(config.inversion_tolerance, 0.1);
        assert_eq!(config.merge_tolerance, 0.3);
        assert!(!config.include_padding);
        assert!(!config.fuzzy_labeling);
        assert_eq!(config.correlation_threshold, 0.9);
        assert_eq!(config.k_folds, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_ignored_ids() {
        let config = AnalysisConfig::new();
        assert!(!config.should_process_id(0x7DF));
        assert!(!config.should_process_id(0x7E8));
        assert!(config.should_process_id(0x123));

        let config = config.with_ignored_ids(Vec::new());
        assert!(config.should_process_id(0x7E8));
    }

    #[test]
    fn test_grid_values() {
        let config = AnalysisConfig::new();
        let grid = config.grid_values();
        assert_eq!(grid.len(), 101);
        assert_eq!(grid[0], 0.0);
        assert!((grid[100] - 1.0).abs() < 1e-12);

        let coarse = AnalysisConfig::new().with_grid(0.25, 1.0).grid_values();
        assert_eq!(coarse, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(AnalysisConfig::new().with_k_folds(1).validate().is_err());
        assert!(AnalysisConfig::new().with_subset_fraction(1.5).validate().is_err());
        assert!(AnalysisConfig::new().with_inversion_tolerance(-0.1).validate().is_err());
        assert!(AnalysisConfig::new().with_grid(0.0, 1.0).validate().is_err());
    }
}
