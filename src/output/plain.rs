//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::results::{PortState, ScanResults, TargetReport};
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Write results in human-readable plain text format.
pub fn write_plain<W: Write>(mut out: W, results: &ScanResults) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out, "                      {} Scan Results", style("bps").cyan().bold())?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Ports:").bold(), results.ports)?;
    writeln!(out, "  {} {}", style("Timing:").bold(), results.timing)?;

    let summary = &results.summary;
    writeln!(
        out,
        "  {} {} probes in {:.2}s",
        style("Statistics:").bold(),
        summary.jobs,
        results.duration_ms as f64 / 1000.0
    )?;
    writeln!(
        out,
        "              {} open, {} closed, {} filtered",
        style(summary.open).green().bold(),
        style(summary.closed).red(),
        style(summary.filtered).yellow()
    )?;
    if summary.dropped > 0 {
        writeln!(
            out,
            "              {} not scanned (out of sockets)",
            style(summary.dropped).red().bold()
        )?;
    }

    for target in &results.targets {
        writeln!(out)?;
        write_target(&mut out, target)?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    Ok(())
}

fn write_target<W: Write>(out: &mut W, target: &TargetReport) -> io::Result<()> {
    if target.target == target.ip_address {
        writeln!(out, "  {} {}", style("Target:").bold(), target.target)?;
    } else {
        writeln!(
            out,
            "  {} {} ({})",
            style("Target:").bold(),
            target.target,
            target.ip_address
        )?;
    }

    if target.ports.is_empty() {
        writeln!(out, "  {}", style("no open ports found.").dim())?;
        return Ok(());
    }

    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    writeln!(
        out,
        "  {:>6}  {:^10}  {}",
        style("PORT").bold(),
        style("STATE").bold(),
        style("SERVICE").bold()
    )?;
    writeln!(out, "  {}", style(THIN_RULE).dim())?;

    for port in &target.ports {
        let state_style = match port.state {
            PortState::Open => Style::new().green().bold(),
            PortState::Closed => Style::new().red(),
            PortState::Filtered => Style::new().yellow(),
            PortState::Unknown => Style::new().dim(),
        };

        writeln!(
            out,
            "  {:>6}  {:^10}  {}",
            port.port,
            state_style.apply_to(port.state.to_string()),
            port.service
        )?;
    }

    Ok(())
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures;

    fn render() -> String {
        let mut buf = Vec::new();
        write_plain(&mut buf, &fixtures::results()).unwrap();
        console::strip_ansi_codes(&String::from_utf8(buf).unwrap()).into_owned()
    }

    #[test]
    fn test_plain_lists_open_ports() {
        let text = render();
        assert!(text.contains("Target: router (192.168.1.1)"));
        let row = text.lines().find(|l| l.contains("ssh")).unwrap();
        assert!(row.contains("22"));
        assert!(row.contains("open"));
    }

    #[test]
    fn test_plain_reports_empty_target() {
        let text = render();
        let after = text.split("Target: 10.0.0.9").nth(1).unwrap();
        assert!(after.contains("no open ports found."));
    }

    #[test]
    fn test_plain_statistics() {
        let text = render();
        assert!(text.contains("2048 probes in 1.25s"));
        assert!(text.contains("1 open, 2047 closed, 0 filtered"));
        assert!(!text.contains("not scanned"));
    }
}
