//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use can_reverse::{AnalysisConfig, KnownSignal};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub known_signals: Vec<KnownSignalSource>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// candump logs, concatenated in order
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub report: Option<PathBuf>,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report: None,
            pretty: default_pretty(),
        }
    }
}

fn default_pretty() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// A decoded reference series stored as `timestamp,value` lines
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnownSignalSource {
    pub name: String,
    pub path: PathBuf,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .analysis
        .validate()
        .with_context(|| format!("Invalid [analysis] section in {:?}", path))?;

    Ok(config)
}

/// Load one known signal from a `timestamp,value` CSV file.
///
/// A non-numeric first line is treated as a header. Samples are returned in
/// ascending timestamp order whatever order the file lists them in.
pub fn load_known_signal(source: &KnownSignalSource) -> Result<KnownSignal> {
    let content = fs::read_to_string(&source.path)
        .with_context(|| format!("Failed to read known signal file: {:?}", source.path))?;

    let mut samples: Vec<(f64, f64)> = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = line
            .split_once(',')
            .and_then(|(t, v)| Some((t.trim().parse::<f64>().ok()?, v.trim().parse::<f64>().ok()?)));
        match parsed {
            Some((t, _)) if !t.is_finite() => {
                bail!("{:?} line {}: timestamp must be finite", source.path, index + 1)
            }
            Some(sample) => samples.push(sample),
            None if index == 0 => continue,
            None => bail!("{:?} line {}: expected 'timestamp,value'", source.path, index + 1),
        }
    }

    if samples.windows(2).any(|w| w[1].0 < w[0].0) {
        log::warn!("Known signal '{}': samples out of order, sorting by timestamp", source.name);
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    let (timestamps, values): (Vec<f64>, Vec<f64>) = samples.into_iter().unzip();

    log::debug!("Known signal '{}': {} sample(s)", source.name, timestamps.len());
    Ok(KnownSignal {
        name: source.name.clone(),
        timestamps,
        values,
    })
}
