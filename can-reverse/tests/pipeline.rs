// End-to-end scenarios for the analysis pipeline
use can_reverse::semantic::non_static_signals;
use can_reverse::{AnalysisConfig, Analyzer, ByteOrder, CanRecord, KnownSignal, SignalKey};
use std::collections::BTreeSet;

const RAMP_LEN: usize = 64;

/// Four single-byte channels: three copies of one ramp (phase shifted by a few
/// milliseconds) and one inverted ramp
fn ramp_capture() -> Vec<CanRecord> {
    let mut records = Vec::new();
    for i in 0..RAMP_LEN {
        let t = i as f64 * 0.1;
        let v = i as u8;
        records.push(CanRecord::new(t, 0x100, vec![v]));
        records.push(CanRecord::new(t + 0.01, 0x200, vec![v]));
        records.push(CanRecord::new(t + 0.03, 0x300, vec![63 - v]));
        records.push(CanRecord::new(t + 0.02, 0x400, vec![v]));
        // OBD-II request traffic is ignored by default
        records.push(CanRecord::new(t + 0.05, 0x7DF, vec![0x02, 0x01, 0x0D]));
    }
    records
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn key(id: u32) -> SignalKey {
    SignalKey::new(id, 0, 7)
}

#[test]
fn test_alternating_channel_end_to_end() {
    let records: Vec<CanRecord> = (0..10)
        .map(|i| CanRecord::new(i as f64 * 0.02, 0x0C1, vec![if i % 2 == 0 { 0x00 } else { 0xFF }]))
        .collect();

    let report = Analyzer::default().analyze(&records).unwrap();
    let channel = &report.channels[&0x0C1];

    assert!(!channel.is_static);
    assert_eq!(channel.tang, vec![1.0; 8]);
    assert_eq!(channel.tokens.len(), 1);
    assert_eq!((channel.tokens[0].start_bit, channel.tokens[0].stop_bit), (0, 7));

    let signal = &report.signals[&0x0C1][&key(0x0C1)];
    assert!(!signal.is_static);
    assert!((signal.shannon_index - 2f64.log10()).abs() < 1e-12);
    // Normalized after the entropy was captured
    assert_eq!(signal.values[0], 0.0);
    assert_eq!(signal.values[1], 1.0);
}

#[test]
fn test_ramp_channels_tokenize_as_one_field() {
    let report = Analyzer::default().analyze(&ramp_capture()).unwrap();

    assert!(!report.channels.contains_key(&0x7DF));
    for id in [0x100, 0x200, 0x300, 0x400] {
        let channel = &report.channels[&id];
        assert_eq!(channel.tokens.len(), 1, "channel 0x{:X}", id);
        assert_eq!(channel.tokens[0].byte_order, ByteOrder::BigEndian);
        assert_eq!(channel.padding, vec![0, 1]);
        assert!(channel.frequency.unwrap().synchronous);
    }
    assert_eq!(report.non_static_signal_count(), 4);
}

#[test]
fn test_subset_clusters_then_propagation() {
    init_logging();
    let config = AnalysisConfig::new().with_subset_fraction(0.5);
    let analyzer = Analyzer::new(config);

    let records = ramp_capture();
    let mut channels = analyzer.build_channels(&records).unwrap();
    analyzer.tokenize(&mut channels);
    let signals = analyzer.generate_signals(&channels);

    // Equal entropy everywhere: the subset is the first two keys
    let (subset_matrix, mut clusters) = analyzer.cluster(&signals).unwrap();
    assert_eq!(subset_matrix.keys(), &[key(0x100), key(0x200)]);
    assert_eq!(clusters.len(), 1);
    let before = clusters.len();

    let (_, full_matrix) = analyzer.propagate(&signals, &mut clusters).unwrap();
    assert_eq!(full_matrix.len(), 4);
    assert!(clusters.len() <= before);

    let members: BTreeSet<SignalKey> = clusters[&0].iter().copied().collect();
    assert_eq!(members, BTreeSet::from([key(0x100), key(0x200), key(0x400)]));
    assert!(full_matrix.value(&key(0x100), &key(0x300)).unwrap() < -0.99);
}

#[test]
fn test_full_report_is_reproducible() {
    let analyzer = Analyzer::new(AnalysisConfig::new().with_subset_fraction(1.0));
    let first = analyzer.analyze(&ramp_capture()).unwrap();
    let second = analyzer.analyze(&ramp_capture()).unwrap();
    assert_eq!(first.clusters, second.clusters);
    assert_eq!(first.clusters.len(), 1);
    assert_eq!(first.clusters[&0].len(), 3);
}

#[test]
fn test_known_signal_labeling() {
    let known = vec![KnownSignal {
        name: "Engine RPM".to_string(),
        timestamps: (0..RAMP_LEN).map(|i| i as f64 * 0.1 + 0.04).collect(),
        values: (0..RAMP_LEN).map(|i| 800.0 + 25.0 * i as f64).collect(),
    }];

    let report = Analyzer::default()
        .with_known_signals(known)
        .analyze(&ramp_capture())
        .unwrap();

    assert_eq!(report.known_matches.len(), 4);
    let inverted = &report.signals[&0x300][&key(0x300)];
    assert_eq!(inverted.known_label.as_deref(), Some("Engine RPM"));
    assert!(inverted.known_correlation.unwrap() < -0.99);
}

#[test]
fn test_calibration_on_ramps() {
    init_logging();
    let analyzer = Analyzer::new(AnalysisConfig::new().with_grid(0.25, 1.0));
    let mut channels = analyzer.build_channels(&ramp_capture()).unwrap();
    analyzer.tokenize(&mut channels);

    let result = analyzer.calibrate(&channels).unwrap();
    assert_eq!(result.channels_scored, 4);
    assert_eq!(result.score_matrix.len(), 5);
    assert!(result.score_matrix.iter().flatten().all(|s| (0.0..=1.0).contains(s)));

    let best = result.score_matrix[result.optimal_inversion_index][result.optimal_merge_index];
    assert!(result.score_matrix.iter().flatten().all(|s| *s <= best));
    assert_eq!(result.optimal_inversion, result.inversion_values[result.optimal_inversion_index]);
}

#[test]
fn test_non_static_population() {
    let report = Analyzer::default().analyze(&ramp_capture()).unwrap();
    let keys: Vec<SignalKey> = non_static_signals(&report.signals).iter().map(|s| s.key).collect();
    assert_eq!(keys, vec![key(0x100), key(0x200), key(0x300), key(0x400)]);
}

#[test]
fn test_constant_after_alignment_does_not_block_clustering() {
    init_logging();
    let mut records = Vec::new();
    for i in 0..RAMP_LEN {
        let t = i as f64 * 0.1;
        records.push(CanRecord::new(t, 0x100, vec![i as u8]));
        records.push(CanRecord::new(t + 0.01, 0x200, vec![i as u8]));
    }
    // Varies, but only long after the other channels stop: flat once aligned
    for (i, v) in [1u8, 2, 3, 4].iter().enumerate() {
        records.push(CanRecord::new(100.0 + i as f64, 0x300, vec![*v]));
    }

    let analyzer = Analyzer::new(AnalysisConfig::new().with_subset_fraction(1.0));
    let mut channels = analyzer.build_channels(&records).unwrap();
    analyzer.tokenize(&mut channels);
    let signals = analyzer.generate_signals(&channels);
    assert!(!signals[&0x300][&key(0x300)].is_static);

    let (subset_matrix, mut clusters) = analyzer.cluster(&signals).unwrap();
    assert_eq!(subset_matrix.keys(), &[key(0x100), key(0x200)]);
    assert_eq!(clusters.len(), 1);

    let (_, full_matrix) = analyzer.propagate(&signals, &mut clusters).unwrap();
    assert_eq!(full_matrix.keys(), &[key(0x100), key(0x200)]);
    assert_eq!(clusters[&0], vec![key(0x100), key(0x200)]);

    let report = analyzer.analyze(&records).unwrap();
    assert_eq!(report.clusters.len(), 1);
    assert_eq!(report.clusters[&0].len(), 2);
}
