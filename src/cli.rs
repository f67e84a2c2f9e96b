//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::aggregate::{SortField, SourceFilter};
use crate::models::Parameter;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// AquaGuard - community water quality monitor
///
/// Classify sensor readings into risk tiers, browse and export historical
/// data, and request an AI-generated bilingual health risk narrative.
///
/// Examples:
///   aquaguard --input readings.json --sources sources.json
///   aquaguard --input readings.json --from 2024-06-01 --to 2024-06-30 --export .
///   aquaguard --input readings.json --analyze --language te
///   aquaguard --follow --analyze < feed.jsonl
///   aquaguard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Readings dataset to load (JSON array of sensor readings)
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["init_config", "follow", "add"]
    )]
    pub input: Option<PathBuf>,

    /// Water sources dataset (JSON array); used to resolve source names
    #[arg(short, long, value_name = "FILE")]
    pub sources: Option<PathBuf>,

    /// Record one manual reading (inline JSON) before other operations
    ///
    /// Example: --add '{"source_id": 1, "location": "Borehole B", "ph_level": 6.8}'
    #[arg(long, value_name = "JSON")]
    pub add: Option<String>,

    /// Start of the date range filter (YYYY-MM-DD, inclusive)
    ///
    /// Filtering applies only when both --from and --to are given;
    /// a single bound leaves the data unfiltered.
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// End of the date range filter (YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,

    /// Restrict the view to one water source id ("all" for no restriction)
    #[arg(long, default_value = "all", value_name = "ID")]
    pub source: String,

    /// Field to sort the readings view by
    ///
    /// One of: recorded_at, ph_level, turbidity, temperature,
    /// bacterial_count, dissolved_oxygen, chlorine_level, tds_level
    #[arg(long, default_value = "recorded_at", value_name = "FIELD")]
    pub sort_by: String,

    /// Sort order for the readings view
    #[arg(long, default_value = "desc", value_name = "ORDER")]
    pub order: SortOrderArg,

    /// Print summary statistics instead of the readings table
    #[arg(long)]
    pub summary: bool,

    /// Compare water sources by id (comma-separated)
    ///
    /// Example: --compare 1,2,3
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub compare: Option<Vec<i64>>,

    /// Export the filtered readings as CSV into DIR
    #[arg(long, value_name = "DIR")]
    pub export: Option<PathBuf>,

    /// Request the AI health risk analysis for the most recent reading
    #[arg(short, long)]
    pub analyze: bool,

    /// Language(s) for the analysis narrative
    #[arg(long, default_value = "both", value_name = "LANG")]
    pub language: Language,

    /// Follow a real-time feed of readings on stdin (one JSON object
    /// per line); each pushed reading refreshes the analysis
    #[arg(long)]
    pub follow: bool,

    /// Completion endpoint base URL
    #[arg(
        long,
        default_value = "https://openrouter.ai/api/v1",
        env = "AQUAGUARD_ENDPOINT"
    )]
    pub endpoint: String,

    /// API key for the completion endpoint
    #[arg(long, env = "AQUAGUARD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model to request for the analysis
    #[arg(
        short,
        long,
        default_value = "qwen/qwen-2.5-72b-instruct",
        env = "AQUAGUARD_MODEL"
    )]
    pub model: String,

    /// Sampling temperature (0.0 - 1.0)
    ///
    /// Kept low so repeated analyses converge on the same risk tier
    #[arg(long, default_value = "0.3")]
    pub temperature: f32,

    /// Request timeout in seconds for the analysis call
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .aquaguard.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Fail with exit code 2 when the latest reading's risk tier is at
    /// or above this level
    ///
    /// Useful for scheduled checks. Values: low, medium, high
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<TierArg>,

    /// Generate a default .aquaguard.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Sort order for the readings view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortOrderArg {
    Asc,
    #[default]
    Desc,
}

/// Narrative language selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Language {
    En,
    Te,
    #[default]
    Both,
}

/// Risk tier for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum TierArg {
    Low,
    Medium,
    High,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Validate the source filter
        if self.source != "all" && self.source.parse::<i64>().is_err() {
            return Err("Source must be a numeric id or 'all'".to_string());
        }

        // Validate the sort field
        if self.sort_by != "recorded_at" && self.sort_by.parse::<Parameter>().is_err() {
            return Err(format!("Unknown sort field: {}", self.sort_by));
        }

        // Validate the endpoint URL (only needed when the model is called)
        if (self.analyze || self.follow)
            && !self.endpoint.starts_with("http://")
            && !self.endpoint.starts_with("https://")
        {
            return Err("Endpoint URL must start with 'http://' or 'https://'".to_string());
        }

        // Validate temperature range
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Validate the input file if provided
        if let Some(ref input) = self.input {
            if !input.exists() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// The parsed source filter. Falls back to pass-through for values
    /// `validate` would have rejected.
    pub fn source_filter(&self) -> SourceFilter {
        match self.source.as_str() {
            "all" => SourceFilter::All,
            id => id.parse().map(SourceFilter::Id).unwrap_or(SourceFilter::All),
        }
    }

    /// The parsed sort field. Falls back to the timestamp for values
    /// `validate` would have rejected.
    pub fn sort_field(&self) -> SortField {
        self.sort_by
            .parse::<Parameter>()
            .map(SortField::Parameter)
            .unwrap_or(SortField::RecordedAt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: None,
            sources: None,
            add: None,
            from: None,
            to: None,
            source: "all".to_string(),
            sort_by: "recorded_at".to_string(),
            order: SortOrderArg::Desc,
            summary: false,
            compare: None,
            export: None,
            analyze: false,
            language: Language::Both,
            follow: false,
            endpoint: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            model: "qwen/qwen-2.5-72b-instruct".to_string(),
            temperature: 0.3,
            timeout: None,
            config: None,
            fail_on: None,
            init_config: false,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn test_validation_accepts_defaults() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_source() {
        let mut args = make_args();
        args.source = "well-a".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_sort_field() {
        let mut args = make_args();
        args.sort_by = "salinity".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_endpoint_only_when_analyzing() {
        let mut args = make_args();
        args.endpoint = "localhost:11434".to_string();
        assert!(args.validate().is_ok());

        args.analyze = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_temperature_range() {
        let mut args = make_args();
        args.temperature = 1.5;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_source_filter_parsing() {
        let mut args = make_args();
        assert_eq!(args.source_filter(), SourceFilter::All);

        args.source = "3".to_string();
        assert_eq!(args.source_filter(), SourceFilter::Id(3));
    }

    #[test]
    fn test_sort_field_parsing() {
        let mut args = make_args();
        assert_eq!(args.sort_field(), SortField::RecordedAt);

        args.sort_by = "ph_level".to_string();
        assert_eq!(args.sort_field(), SortField::Parameter(Parameter::PhLevel));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
