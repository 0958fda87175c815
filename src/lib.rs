//! # bps - A Concurrent TCP Connect Port Scanner
//!
//! bps decides, for every (target, port) pair, whether the port is open,
//! closed or filtered by completing (or failing to complete) a full TCP
//! handshake. Thousands of attempts run at once on a multi-threaded tokio
//! runtime under a fixed connection budget.
//!
//! ## Features
//!
//! - **Timing Templates**: Seven levels trading speed for accuracy
//! - **Flexible Targeting**: IPv4 addresses, hostnames, and CIDR ranges
//! - **Resource Aware**: Backs off and retries when the OS runs out of sockets
//! - **Multiple Output Formats**: Plain text, JSON, and CSV
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use bps::config::TimingProfile;
//! use bps::scanner::{ScanConfig, Scanner};
//! use bps::types::PortRange;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScanConfig::new(PortRange::new(1, 1024)?, TimingProfile::from_level(4)?);
//!     let results = Scanner::new(config).scan_blocking("192.168.1.1,example.com")?;
//!
//!     for target in &results.targets {
//!         for port in &target.ports {
//!             println!("{} {}/tcp {} {}", target.target, port.port, port.state, port.service);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, targets and target resolution
//! - [`scanner`] - The concurrent engine: throttle, probe, retry, diagnostics
//! - [`results`] - Thread-safe result aggregation and the frozen report
//! - [`services`] - Port to service name lookup
//! - [`config`] - Timing templates and the settings file
//! - [`cli`] - Command-line arguments
//! - [`output`] - Output formatting
//! - [`error`] - Error types

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod results;
pub mod scanner;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use error::{ConfigError, ScanError};
pub use results::{PortInfo, PortState, ResultStore, ScanResults};
pub use scanner::{ScanConfig, Scanner, MAX_RETRIES};
pub use types::{PortRange, Target, TargetSpec};
