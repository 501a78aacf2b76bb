//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::exporter::OutputFormat;

/// Default seconds between export ticks for the demo.
pub const DEFAULT_PERIOD_SECS: f64 = 0.05;

/// Tally metrics pipeline driver
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about = "Drive a workload through the Tally metrics pipeline")]
pub struct Args {
    /// Seconds between collection ticks (fractional allowed)
    #[arg(short, long, default_value_t = DEFAULT_PERIOD_SECS)]
    pub period: f64,

    /// Export timeout in seconds
    #[arg(long, default_value_t = tally_core::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Report cumulative totals instead of per-tick deltas
    #[arg(long)]
    pub stateful: bool,

    /// Histogram boundaries for the latency recorder (sorted, comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub boundaries: Vec<f64>,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,

    /// Workload file (`instrument,value,labels` per line)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Number of synthetic operations when no input file is given
    #[arg(short = 'n', long, default_value_t = 20)]
    pub iterations: usize,

    /// Seed for the synthetic workload
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pause between operations in milliseconds
    #[arg(long, default_value_t = 10)]
    pub interval_ms: u64,

    /// Meter name
    #[arg(short, long, default_value = "tally")]
    pub meter: String,
}

impl Args {
    /// Check arguments clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.boundaries.iter().any(|b| !b.is_finite()) {
            return Err("histogram boundaries must be finite".to_string());
        }
        if self.boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err("histogram boundaries must be strictly increasing".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["tally"]);
        assert_eq!(args.period, DEFAULT_PERIOD_SECS);
        assert_eq!(args.timeout, 30);
        assert!(!args.stateful);
        assert!(args.boundaries.is_empty());
        assert_eq!(args.format, OutputFormat::Text);
        assert_eq!(args.iterations, 20);
        assert_eq!(args.meter, "tally");
    }

    #[test]
    fn test_boundaries_parse() {
        let args = Args::parse_from(["tally", "--boundaries", "10,20,50", "--stateful"]);
        assert_eq!(args.boundaries, vec![10.0, 20.0, 50.0]);
        assert!(args.stateful);
        assert!(args.validate().is_ok());

        let args = Args::parse_from(["tally", "-b", "20,10"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_json_format() {
        let args = Args::parse_from(["tally", "--format", "json", "-p", "0.5"]);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.period, 0.5);
    }
}
