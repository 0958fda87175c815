//! Error types for bps.
//!
//! Uses `thiserror` for ergonomic error definitions. Per-job network
//! failures are never errors at this level: they are classified into a
//! [`PortState`](crate::results::PortState) or counted as diagnostics.

use std::path::PathBuf;
use thiserror::Error;

pub use crate::types::{PortError, TargetError};

/// Errors that abort a scan before or while it is being set up.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No valid targets resolved")]
    NoTargets,

    #[error("Failed to start scan runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Configuration and settings errors. These are the only fatal errors a
/// user can trigger.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("timing level {0} is out of range (0-6)")]
    TimingOutOfRange(u8),

    #[error("start port {start} is greater than end port {end}")]
    InvalidPortRange { start: u16, end: u16 },

    #[error("no targets given")]
    EmptyTargets,

    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid settings file: {0}")]
    InvalidFormat(String),

    #[error("unknown output format: {0}")]
    UnknownOutputFormat(String),
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
