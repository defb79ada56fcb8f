//! Tagging discovered signals with known (externally decoded) signals

use crate::semantic::correlation::pearson_correlation;
use crate::semantic::frame::{reindex_nearest, SignalFrame};
use crate::types::{AnalysisError, KnownSignal, Result, SignalKey, SignalMap};
use serde::Serialize;

/// Strongest known-signal match of one discovered signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnownMatch {
    pub key: SignalKey,
    pub label: String,
    pub correlation: f64,
}

/// Correlate every frame column with every known signal and tag the matches.
///
/// The frame is first cut to the time span all known signals cover. A signal is
/// tagged when its strongest absolute coefficient reaches the threshold; the
/// stored coefficient keeps its sign.
pub fn known_signal_labeling(
    frame: &SignalFrame,
    known: &[KnownSignal],
    signals: &mut SignalMap,
    correlation_threshold: f64,
) -> Result<Vec<KnownMatch>> {
    let spans: Vec<(f64, f64)> = known
        .iter()
        .filter_map(|k| Some((*k.timestamps.first()?, *k.timestamps.last()?)))
        .collect();
    if spans.is_empty() || frame.is_empty() {
        return Ok(Vec::new());
    }

    let latest_start = spans.iter().map(|s| s.0).fold(f64::NEG_INFINITY, f64::max);
    let earliest_end = spans.iter().map(|s| s.1).fold(f64::INFINITY, f64::min);
    let window = frame.window(latest_start, earliest_end);
    if window.index.len() < 2 {
        log::warn!("Known signals and discovered signals barely overlap, skipping labeling");
        return Ok(Vec::new());
    }

    let known_columns: Vec<(&str, Vec<f64>)> = known
        .iter()
        .filter(|k| !k.timestamps.is_empty())
        .map(|k| (k.name.as_str(), reindex_nearest(&k.timestamps, &k.values, &window.index)))
        .collect();

    let mut matches = Vec::new();
    for (key, column) in window.keys.iter().zip(&window.columns) {
        let best = known_columns
            .iter()
            .filter_map(|(name, values)| Some((*name, pearson_correlation(column, values)?)))
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));

        let Some((name, correlation)) = best else {
            continue;
        };
        if correlation.abs() < correlation_threshold {
            continue;
        }

        let signal = signals
            .get_mut(&key.arbitration_id)
            .and_then(|by_key| by_key.get_mut(key))
            .ok_or(AnalysisError::UnknownSignal(*key))?;
        log::debug!("Signal {} matches known signal '{}' (r = {:.3})", key, name, correlation);
        signal.known_label = Some(name.to_string());
        signal.known_correlation = Some(correlation);
        matches.push(KnownMatch {
            key: *key,
            label: name.to_string(),
            correlation,
        });
    }

    log::info!("Tagged {} signal(s) with known signal labels", matches.len());
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signal;
    use std::collections::BTreeMap;

    fn signal(id: u32, values: Vec<f64>) -> Signal {
        Signal {
            key: SignalKey::new(id, 0, 7),
            timestamps: (0..values.len()).map(|i| i as f64).collect(),
            values,
            shannon_index: 1.0,
            is_static: false,
            known_label: None,
            known_correlation: None,
        }
    }

    #[test]
    fn test_labels_best_match() {
        let speed = signal(0x100, vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]);
        let noise = signal(0x200, vec![0.5, 0.1, 0.9, 0.2, 0.7, 0.3]);
        let frame = SignalFrame::from_signals(&[&speed, &noise]);

        let mut signals: SignalMap = BTreeMap::new();
        for s in [speed.clone(), noise.clone()] {
            signals.entry(s.key.arbitration_id).or_default().insert(s.key, s);
        }

        let known = vec![KnownSignal {
            name: "Vehicle Speed".to_string(),
            timestamps: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            values: vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0],
        }];

        let matches = known_signal_labeling(&frame, &known, &mut signals, 0.85).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].key, speed.key);
        let tagged = &signals[&0x100][&speed.key];
        assert_eq!(tagged.known_label.as_deref(), Some("Vehicle Speed"));
        assert!((tagged.known_correlation.unwrap() - 1.0).abs() < 1e-9);
        assert!(signals[&0x200][&noise.key].known_label.is_none());
    }

    #[test]
    fn test_no_known_signals() {
        let s = signal(0x100, vec![0.0, 1.0]);
        let frame = SignalFrame::from_signals(&[&s]);
        let mut signals = SignalMap::new();
        assert!(known_signal_labeling(&frame, &[], &mut signals, 0.85).unwrap().is_empty());
    }
}
