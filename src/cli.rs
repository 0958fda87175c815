//! Command-line interface definitions for bps.
//!
//! Uses `clap` derive macros for declarative argument parsing. Flags that
//! are not given fall back to the settings file, then to built-in
//! defaults.

use crate::config::{Settings, TimingProfile};
use crate::error::{ConfigError, ConfigResult};
use crate::scanner::ScanConfig;
use crate::types::PortRange;
use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A concurrent TCP connect port scanner.
#[derive(Parser, Debug)]
#[command(name = "bps")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A concurrent TCP connect port scanner", long_about = None)]
pub struct Args {
    /// Comma-separated targets: IPv4 addresses, hostnames or CIDR blocks
    ///
    /// Examples:
    ///   192.168.1.1
    ///   example.com,10.0.0.1
    ///   192.168.1.0/24
    #[arg(short, long, value_name = "LIST")]
    pub target: String,

    /// First port to scan
    #[arg(short, long, default_value_t = 1)]
    pub start: u16,

    /// Last port to scan
    #[arg(short, long, default_value_t = 10000)]
    pub end: u16,

    /// Scan only ports up to 1024
    #[arg(short = 'F', long)]
    pub fast: bool,

    /// Timing template, 0 (slow, patient) to 6 (fast, aggressive)
    #[arg(short = 'T', long, value_name = "0-6")]
    pub timing: Option<u8>,

    /// Include closed ports in the results
    #[arg(short = 'C', long)]
    pub closed: bool,

    /// Output format for results
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Show a progress bar while scanning
    #[arg(long)]
    pub progress: bool,

    /// Log scan progress and discovered ports
    #[arg(short, long)]
    pub verbose: bool,

    /// Log every failed connection attempt
    #[arg(short, long)]
    pub debug: bool,

    /// Path to a settings file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Load the settings file named by `--config`, or the default one if
    /// it exists.
    pub fn settings(&self) -> ConfigResult<Settings> {
        match &self.config {
            Some(path) => Settings::load_from(path),
            None => Settings::load(),
        }
    }

    /// The host list, rejected if it names no hosts at all.
    pub fn targets(&self) -> ConfigResult<&str> {
        if self.target.split(',').all(|t| t.trim().is_empty()) {
            return Err(ConfigError::EmptyTargets);
        }
        Ok(&self.target)
    }

    /// The port range to scan.
    pub fn port_range(&self) -> ConfigResult<PortRange> {
        let end = if self.fast { PortRange::FAST_END } else { self.end };
        PortRange::new(self.start, end).map_err(|_| ConfigError::InvalidPortRange {
            start: self.start,
            end,
        })
    }

    /// Build a validated scan configuration, filling unset flags from
    /// `settings`.
    pub fn scan_config(&self, settings: &Settings) -> ConfigResult<ScanConfig> {
        self.targets()?;
        let ports = self.port_range()?;
        let timing = TimingProfile::from_level(self.timing.unwrap_or(settings.timing))?;

        let config = ScanConfig::new(ports, timing);
        Ok(if self.closed || settings.show_closed {
            config.with_closed()
        } else {
            config
        })
    }

    /// The output format, from the flag or the settings file.
    pub fn output_format(&self, settings: &Settings) -> ConfigResult<OutputFormat> {
        match self.output {
            Some(format) => Ok(format),
            None => settings.output_format.parse(),
        }
    }

    /// Log filter directive implied by `-v` and `-d`.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(ConfigError::UnknownOutputFormat(s.to_string())),
        }
    }
}
