//! Output formatting module.
//!
//! Provides formatters for plain text, JSON, and CSV output of scan
//! results. Every formatter writes to any [`Write`] so results can be
//! rendered into a buffer as easily as to stdout.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::write_csv;
pub use json_format::write_json;
pub use plain::{print_error, print_warning, write_plain};

use crate::cli::OutputFormat;
use crate::results::ScanResults;
use std::io::{self, Write};

/// Write scan results in the given format.
pub fn write_results<W: Write>(out: W, results: &ScanResults, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => write_plain(out, results),
        OutputFormat::Json => write_json(out, results),
        OutputFormat::Csv => write_csv(out, results),
    }
}

/// Print scan results to stdout.
pub fn print_results(results: &ScanResults, format: OutputFormat) -> io::Result<()> {
    write_results(io::stdout().lock(), results, format)
}
