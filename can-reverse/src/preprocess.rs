//! Channel construction from raw records
//!
//! Groups records by arbitration ID and applies the validation the rest of the
//! pipeline relies on: one DLC per ID, unique ascending timestamps, payloads cut
//! to the DLC.

use crate::config::AnalysisConfig;
use crate::frequency::{analyze_transmission_frequency, FrequencyParams};
use crate::lexical::generate_bit_matrix_and_tang;
use crate::types::{BitMatrix, CanRecord, Channel, ChannelMap, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Group records into validated, unprocessed channels
pub fn group_records(records: &[CanRecord], config: &AnalysisConfig) -> Vec<Channel> {
    let mut grouped: BTreeMap<u32, Vec<&CanRecord>> = BTreeMap::new();
    for record in records {
        if config.should_process_id(record.arbitration_id) {
            grouped.entry(record.arbitration_id).or_default().push(record);
        }
    }

    let mut channels = Vec::with_capacity(grouped.len());
    for (id, mut rows) in grouped {
        let dlc = rows[0].dlc;
        if rows.iter().any(|r| r.dlc != dlc) {
            log::warn!("Arbitration ID 0x{:X} uses more than one DLC, dropping it", id);
            continue;
        }
        if dlc > 8 || rows.iter().any(|r| r.data.len() < dlc as usize) {
            log::warn!("Arbitration ID 0x{:X} has payloads shorter than DLC {}, dropping it", id, dlc);
            continue;
        }

        rows.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let before = rows.len();
        rows.dedup_by(|later, earlier| later.timestamp == earlier.timestamp);
        if rows.len() < before {
            log::debug!(
                "Arbitration ID 0x{:X}: dropped {} duplicate timestamp(s)",
                id,
                before - rows.len()
            );
        }

        channels.push(Channel {
            id,
            dlc: dlc as usize,
            timestamps: rows.iter().map(|r| r.timestamp).collect(),
            payloads: rows.iter().map(|r| r.data[..dlc as usize].to_vec()).collect(),
            bit_matrix: BitMatrix::default(),
            tang: Vec::new(),
            is_static: true,
            is_short: true,
            tokens: Vec::new(),
            padding: Vec::new(),
            frequency: None,
        });
    }

    channels
}

/// Build the channel map: bit matrices, TANGs and timing statistics
pub fn generate_channel_map(records: &[CanRecord], config: &AnalysisConfig) -> Result<ChannelMap> {
    let channels = group_records(records, config);
    log::info!("Building {} channel(s) from {} record(s)", channels.len(), records.len());

    let params = FrequencyParams {
        time_convert: config.time_convert,
        ci_z: config.ci_z,
        synchronous_threshold: config.synchronous_threshold,
    };

    channels
        .into_par_iter()
        .map(|mut channel| {
            generate_bit_matrix_and_tang(&mut channel, config.tang_normalization, config.min_observations)?;
            if !channel.is_short {
                channel.frequency =
                    analyze_transmission_frequency(&channel.timestamps, config.min_observations, params);
            }
            Ok((channel.id, channel))
        })
        .collect::<Result<Vec<_>>>()
        .map(|pairs| pairs.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: f64, id: u32, data: Vec<u8>) -> CanRecord {
        CanRecord::new(timestamp, id, data)
    }

    #[test]
    fn test_inconsistent_dlc_dropped() {
        let records = vec![
            record(0.0, 0x100, vec![1, 2]),
            record(0.1, 0x100, vec![1, 2, 3]),
            record(0.0, 0x200, vec![1]),
        ];
        let channels = group_records(&records, &AnalysisConfig::new());
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id, 0x200);
    }

    #[test]
    fn test_ignored_ids_and_duplicates() {
        let records = vec![
            record(0.2, 0x100, vec![2]),
            record(0.1, 0x100, vec![1]),
            record(0.1, 0x100, vec![9]),
            record(0.1, 0x7E8, vec![0x41]),
        ];
        let channels = group_records(&records, &AnalysisConfig::new());
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].timestamps, vec![0.1, 0.2]);
        assert_eq!(channels[0].payloads, vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_payload_truncated_to_dlc() {
        let mut short_dlc = record(0.0, 0x300, vec![0xAA, 0xBB, 0xCC]);
        short_dlc.dlc = 2;
        let channels = group_records(&[short_dlc], &AnalysisConfig::new());
        assert_eq!(channels[0].payloads[0], vec![0xAA, 0xBB]);
    }

    #[test]
    fn test_channel_map_flags() {
        let mut records = Vec::new();
        for i in 0..6 {
            records.push(record(i as f64 * 0.1, 0x100, vec![i as u8]));
        }
        records.push(record(0.0, 0x101, vec![0x00]));
        records.push(record(0.5, 0x101, vec![0x01]));

        let map = generate_channel_map(&records, &AnalysisConfig::new()).unwrap();
        let busy = &map[&0x100];
        assert!(!busy.is_static);
        assert!(!busy.is_short);
        assert!(busy.frequency.is_some());

        let short = &map[&0x101];
        assert!(short.is_short);
        assert!(short.frequency.is_none());
    }
}
