//! CAN Reverse CLI Application
//!
//! Command-line front end for the can-reverse library. It adds:
//! - candump log parsing
//! - TOML configuration (analysis thresholds, known signals, output)
//! - Optional tokenizer threshold calibration
//! - JSON report generation

use anyhow::{bail, Context, Result};
use can_reverse::{AnalysisReport, Analyzer, KnownSignal};
use clap::Parser;
use std::path::PathBuf;

mod candump;
mod config;
mod report;

use config::AppConfig;
use report::JsonReport;

/// CAN Reverse - Infer signal layouts from unlabeled CAN traffic
#[derive(Parser, Debug)]
#[command(name = "can-reverse-cli")]
#[command(about = "Unsupervised signal discovery in candump CAN logs", long_about = None)]
#[command(version)]
struct Args {
    /// candump log file(s) to analyze (can be repeated)
    #[arg(short, long, value_name = "FILE")]
    log: Vec<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file for the JSON report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Run the k-fold threshold calibration as well
    #[arg(long)]
    calibrate: bool,

    /// Override the correlation threshold
    #[arg(long, value_name = "R")]
    threshold: Option<f64>,

    /// Disable fuzzy cluster membership
    #[arg(long)]
    crisp: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Reverse CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using analysis library v{}", can_reverse::VERSION);

    let mut app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    apply_overrides(&mut app_config, &args);
    app_config.analysis.validate()?;

    let inputs = if args.log.is_empty() {
        app_config.input.files.clone()
    } else {
        args.log.clone()
    };
    if inputs.is_empty() {
        bail!("No input specified: pass --log <FILE> or list [input] files in the config");
    }

    let mut records = Vec::new();
    for path in &inputs {
        let mut parsed = candump::read_log(path)
            .with_context(|| format!("Failed to read candump log: {:?}", path))?;
        records.append(&mut parsed);
    }

    let known: Vec<KnownSignal> = app_config
        .known_signals
        .iter()
        .map(config::load_known_signal)
        .collect::<Result<_>>()?;

    let analyzer = Analyzer::new(app_config.analysis.clone()).with_known_signals(known);
    let mut analysis = analyzer.analyze(&records)?;
    if app_config.calibration.enabled {
        calibrate(&analyzer, &mut analysis)?;
    }

    let names: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
    let json = JsonReport::new(&analysis, &names, records.len());
    log::info!(
        "{} channel(s), {} non-static signal(s), {} cluster(s)",
        json.summary.channels,
        json.summary.non_static_signals,
        json.summary.clusters
    );

    match args.output.as_ref().or(app_config.output.report.as_ref()) {
        Some(path) => {
            json.write(path, app_config.output.pretty)?;
            log::info!("Report written to {:?}", path);
        }
        None => println!("{}", json.to_json(app_config.output.pretty)?),
    }

    Ok(())
}

/// Command-line flags win over the configuration file
fn apply_overrides(app_config: &mut AppConfig, args: &Args) {
    if args.calibrate {
        app_config.calibration.enabled = true;
    }
    if let Some(threshold) = args.threshold {
        app_config.analysis.correlation_threshold = threshold;
    }
    if args.crisp {
        app_config.analysis.fuzzy_labeling = false;
    }
}

fn calibrate(analyzer: &Analyzer, analysis: &mut AnalysisReport) -> Result<()> {
    match analyzer.calibrate(&analysis.channels) {
        Ok(result) => {
            log::info!(
                "Suggested thresholds: inversion {:.2}, merge {:.2}",
                result.optimal_inversion,
                result.optimal_merge
            );
            analysis.calibration = Some(result);
            Ok(())
        }
        Err(can_reverse::AnalysisError::NoCalibrationCandidates) => {
            log::warn!("No channel has enough observations for calibration");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    // Logs go to stderr so a report on stdout stays parseable
    Builder::new()
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "can-reverse-cli",
            "--log",
            "a.log",
            "--log",
            "b.log",
            "--threshold",
            "0.9",
            "--crisp",
            "--calibrate",
        ]);
        assert_eq!(args.log.len(), 2);

        let mut app_config = AppConfig::default();
        apply_overrides(&mut app_config, &args);
        assert_eq!(app_config.analysis.correlation_threshold, 0.9);
        assert!(!app_config.analysis.fuzzy_labeling);
        assert!(app_config.calibration.enabled);
    }

    #[test]
    fn test_defaults_leave_config_untouched() {
        let args = Args::parse_from(["can-reverse-cli"]);
        let mut app_config = AppConfig::default();
        apply_overrides(&mut app_config, &args);
        assert_eq!(app_config.analysis.correlation_threshold, 0.85);
        assert!(app_config.analysis.fuzzy_labeling);
        assert!(!app_config.calibration.enabled);
    }
}
