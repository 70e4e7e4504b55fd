//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use s3logs2parquet_core::Frequency;

use crate::pipeline::RunOptions;

/// Summarize S3 server access logs with Athena into a consolidated Parquet dataset
#[derive(Debug, Parser)]
#[command(name = "s3logs2parquet")]
#[command(version)]
#[command(about = "Summarize S3 server access logs with Athena into a consolidated Parquet dataset", long_about = None)]
pub struct Cli {
    /// Report on the period preceding today [default: monthly]
    #[arg(long, value_enum, value_name = "FREQUENCY")]
    pub frequency: Option<FrequencyArg>,

    /// Report on an explicit inclusive period
    #[arg(long = "date_range", num_args = 2, value_names = ["START", "END"])]
    pub date_range: Option<Vec<String>>,

    /// Select every log column instead of the summary projection
    #[arg(long = "select_all")]
    pub select_all: bool,

    /// Delete the query engine output under the results prefix after the run
    #[arg(long = "remove_meta")]
    pub remove_meta: bool,

    /// Delete the raw access logs after publishing
    #[arg(long = "remove_original_logs")]
    pub remove_original_logs: bool,

    /// Email the usage report
    #[arg(long)]
    pub email: bool,

    /// Debug logging; also writes the report to email_response.html
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FrequencyArg {
    Weekly,
    Monthly,
    Quarterly,
}

impl From<FrequencyArg> for Frequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::Weekly => Frequency::Weekly,
            FrequencyArg::Monthly => Frequency::Monthly,
            FrequencyArg::Quarterly => Frequency::Quarterly,
        }
    }
}

impl Cli {
    /// Options for one run. The frequency defaults to monthly only when no
    /// explicit range is given; supplying both is left for the resolver to
    /// reject.
    pub fn run_options(&self) -> RunOptions {
        let date_range = match self.date_range.as_deref() {
            Some([start, end]) => Some((start.clone(), end.clone())),
            _ => None,
        };
        let frequency = match (self.frequency, &date_range) {
            (Some(f), _) => Some(f.into()),
            (None, None) => Some(Frequency::Monthly),
            (None, Some(_)) => None,
        };

        RunOptions {
            frequency,
            date_range,
            select_all: self.select_all,
            remove_meta: self.remove_meta,
            remove_original_logs: self.remove_original_logs,
            email: self.email,
            verbose: self.verbose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("s3logs2parquet").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_to_monthly() {
        let opts = parse(&[]).run_options();
        assert_eq!(opts.frequency, Some(Frequency::Monthly));
        assert_eq!(opts.date_range, None);
        assert!(!opts.email && !opts.select_all && !opts.remove_meta);
    }

    #[test]
    fn explicit_range_suppresses_default_frequency() {
        let opts = parse(&["--date_range", "2024-01-01", "2024-01-31"]).run_options();
        assert_eq!(opts.frequency, None);
        assert_eq!(
            opts.date_range,
            Some(("2024-01-01".to_string(), "2024-01-31".to_string()))
        );
    }

    #[test]
    fn both_modes_are_passed_through() {
        let opts = parse(&[
            "--frequency",
            "weekly",
            "--date_range",
            "2024-01-01",
            "2024-01-31",
        ])
        .run_options();
        assert_eq!(opts.frequency, Some(Frequency::Weekly));
        assert!(opts.date_range.is_some());
    }

    #[test]
    fn flags_use_underscored_names() {
        let opts = parse(&[
            "--frequency",
            "quarterly",
            "--select_all",
            "--remove_meta",
            "--remove_original_logs",
            "--email",
            "-v",
        ])
        .run_options();
        assert_eq!(opts.frequency, Some(Frequency::Quarterly));
        assert!(opts.select_all);
        assert!(opts.remove_meta);
        assert!(opts.remove_original_logs);
        assert!(opts.email);
        assert!(opts.verbose);
    }

    #[test]
    fn date_range_needs_two_values() {
        let result = Cli::try_parse_from(["s3logs2parquet", "--date_range", "2024-01-01"]);
        assert!(result.is_err());
    }
}
