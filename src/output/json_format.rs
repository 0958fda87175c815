//! JSON output formatting.

use crate::results::ScanResults;
use std::io::{self, Write};

/// Write results as pretty-printed JSON.
pub fn write_json<W: Write>(mut out: W, results: &ScanResults) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut out, results).map_err(io::Error::other)?;
    writeln!(out)
}
