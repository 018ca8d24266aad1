//! CLI argument definitions using clap.

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use contracts::EventKind;
use std::path::PathBuf;

/// Beacon Dispatch - fan tracking beacons out to analytics backends
#[derive(Parser, Debug)]
#[command(
    name = "beacon-dispatch",
    author,
    version,
    about = "Tracking beacon dispatcher",
    long_about = "Loads a tracker configuration, validates it, and fires page-view or \n\
                  event beacons to every configured backend the client is sampled into."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BEACON_DISPATCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BEACON_DISPATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this port
    #[arg(long, global = true, env = "BEACON_DISPATCH_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration file
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Fire one tracking request to every sampled backend
    Track(TrackArgs),
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "tracker.toml", env = "BEACON_DISPATCH_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "tracker.toml", env = "BEACON_DISPATCH_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `track` command
#[derive(Parser, Debug, Clone)]
#[command(group(ArgGroup::new("request").required(true).args(["page_view", "event"])))]
pub struct TrackArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "tracker.toml", env = "BEACON_DISPATCH_CONFIG")]
    pub config: PathBuf,

    /// Report a page view
    #[arg(long)]
    pub page_view: bool,

    /// Report an interaction event (click, submit, mouseenter, ...)
    #[arg(long, value_parser = parse_event_kind)]
    pub event: Option<EventKind>,

    /// Log beacon URLs instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Pin the sampling bucket (0-99) instead of drawing one
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..100))]
    pub bucket: Option<u8>,

    /// Host name used to scope the sampling cookie
    #[arg(long, default_value = "localhost", env = "BEACON_DISPATCH_PAGE_HOST")]
    pub page_host: String,

    /// Per-request HTTP timeout in milliseconds
    #[arg(long, default_value = "10000", env = "BEACON_DISPATCH_TIMEOUT_MS")]
    pub timeout_ms: u64,
}

fn parse_event_kind(value: &str) -> Result<EventKind, String> {
    value.parse()
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
