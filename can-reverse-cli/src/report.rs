//! JSON report generation

use anyhow::{Context, Result};
use can_reverse::{AnalysisReport, CalibrationResult, KnownMatch, SignalKey, Token};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Serialized form of one analysis run
#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub generated_at: DateTime<Utc>,
    pub tool_version: String,
    pub library_version: String,
    pub inputs: Vec<String>,
    pub summary: Summary,
    pub channels: Vec<ChannelEntry>,
    pub signals: Vec<SignalEntry>,
    pub clusters: Vec<ClusterEntry>,
    pub known_matches: Vec<KnownMatch>,
    pub calibration: Option<CalibrationResult>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub frames: usize,
    pub channels: usize,
    pub static_channels: usize,
    pub signals: usize,
    pub non_static_signals: usize,
    pub clusters: usize,
}

#[derive(Debug, Serialize)]
pub struct ChannelEntry {
    pub id: String,
    pub dlc: usize,
    pub observations: usize,
    pub is_static: bool,
    pub is_short: bool,
    pub tang: Vec<f64>,
    pub tokens: Vec<Token>,
    pub padding: Vec<usize>,
    pub mean_interval_ms: Option<f64>,
    pub synchronous: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SignalEntry {
    pub key: String,
    pub arbitration_id: u32,
    pub start_bit: usize,
    pub stop_bit: usize,
    pub shannon_index: f64,
    pub is_static: bool,
    pub known_label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClusterEntry {
    pub label: usize,
    pub members: Vec<String>,
}

fn key_name(key: &SignalKey) -> String {
    key.to_string()
}

impl JsonReport {
    pub fn new(report: &AnalysisReport, inputs: &[String], frames: usize) -> Self {
        let channels: Vec<ChannelEntry> = report
            .channels
            .values()
            .map(|channel| ChannelEntry {
                id: format!("0x{:X}", channel.id),
                dlc: channel.dlc,
                observations: channel.observations(),
                is_static: channel.is_static,
                is_short: channel.is_short,
                tang: channel.tang.clone(),
                tokens: channel.tokens.clone(),
                padding: channel.padding.clone(),
                mean_interval_ms: channel.frequency.map(|f| f.freq_mean),
                synchronous: channel.frequency.map(|f| f.synchronous),
            })
            .collect();

        let signals: Vec<SignalEntry> = report
            .signals
            .values()
            .flat_map(|by_key| by_key.values())
            .map(|signal| SignalEntry {
                key: key_name(&signal.key),
                arbitration_id: signal.key.arbitration_id,
                start_bit: signal.key.start_bit,
                stop_bit: signal.key.stop_bit,
                shannon_index: signal.shannon_index,
                is_static: signal.is_static,
                known_label: signal.known_label.clone(),
            })
            .collect();

        let clusters: Vec<ClusterEntry> = report
            .clusters
            .iter()
            .map(|(label, members)| ClusterEntry {
                label: *label,
                members: members.iter().map(key_name).collect(),
            })
            .collect();

        let summary = Summary {
            frames,
            channels: channels.len(),
            static_channels: channels.iter().filter(|c| c.is_static).count(),
            signals: report.signal_count(),
            non_static_signals: report.non_static_signal_count(),
            clusters: clusters.len(),
        };

        Self {
            generated_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            library_version: can_reverse::VERSION.to_string(),
            inputs: inputs.to_vec(),
            summary,
            channels,
            signals,
            clusters,
            known_matches: report.known_matches.clone(),
            calibration: report.calibration.clone(),
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        json.context("Failed to serialize report")
    }

    pub fn write(&self, path: &Path, pretty: bool) -> Result<()> {
        fs::write(path, self.to_json(pretty)?)
            .with_context(|| format!("Failed to write report: {:?}", path))
    }
}
