//! Transmission frequency and synchronicity statistics

use crate::types::FrequencyStats;

/// Parameters of the interval confidence interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyParams {
    /// Multiplier from timestamp units to reported units (1000 = s to ms)
    pub time_convert: f64,
    /// z value of the confidence level (1.645 for 90%)
    pub ci_z: f64,
    /// Largest CI width relative to the mean that still counts as synchronous
    pub synchronous_threshold: f64,
}

/// Analyze the intervals between consecutive timestamps.
///
/// Needs at least `min_observations` timestamps (and never fewer than three, so
/// the sample standard deviation is defined); returns None otherwise.
pub fn analyze_transmission_frequency(
    timestamps: &[f64],
    min_observations: usize,
    params: FrequencyParams,
) -> Option<FrequencyStats> {
    if timestamps.len() < min_observations.max(3) {
        return None;
    }

    let intervals: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
    let n = intervals.len() as f64;
    let mean = intervals.iter().sum::<f64>() / n;
    let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / (n - 1.0);

    let freq_mean = mean * params.time_convert;
    if freq_mean <= 0.0 {
        return None;
    }
    let freq_std = variance.sqrt() * params.time_convert;
    // Assumes normally distributed intervals
    let mean_offset = params.ci_z * freq_std / n.sqrt();
    let mean_to_ci_ratio = 2.0 * mean_offset / freq_mean;

    Some(FrequencyStats {
        ci_sensitivity: params.ci_z,
        freq_mean,
        freq_std,
        freq_ci: (freq_mean - mean_offset, freq_mean + mean_offset),
        mean_to_ci_ratio,
        synchronous: mean_to_ci_ratio <= params.synchronous_threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FrequencyParams {
        FrequencyParams {
            time_convert: 1000.0,
            ci_z: 1.645,
            synchronous_threshold: 0.1,
        }
    }

    #[test]
    fn test_perfectly_periodic() {
        let stats = analyze_transmission_frequency(&[0.0, 1.0, 2.0, 3.0, 4.0], 4, params()).unwrap();
        assert_eq!(stats.freq_mean, 1000.0);
        assert_eq!(stats.freq_std, 0.0);
        assert_eq!(stats.freq_ci, (1000.0, 1000.0));
        assert_eq!(stats.mean_to_ci_ratio, 0.0);
        assert!(stats.synchronous);
    }

    #[test]
    fn test_jittery_is_asynchronous() {
        let stats =
            analyze_transmission_frequency(&[0.0, 0.01, 0.5, 0.52, 1.4, 1.41], 4, params()).unwrap();
        assert!(stats.freq_std > 0.0);
        assert!(stats.freq_ci.0 < stats.freq_mean && stats.freq_mean < stats.freq_ci.1);
        assert!(!stats.synchronous);
    }

    #[test]
    fn test_too_few_observations() {
        assert!(analyze_transmission_frequency(&[0.0, 1.0, 2.0], 4, params()).is_none());
        assert!(analyze_transmission_frequency(&[], 0, params()).is_none());
    }
}
