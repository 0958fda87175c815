//! CSV output formatting.
//!
//! One row per recorded port; targets with nothing recorded produce no
//! rows.

use crate::results::ScanResults;
use std::io::{self, Write};

/// Write results as CSV.
pub fn write_csv<W: Write>(out: W, results: &ScanResults) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["target", "ip", "port", "state", "service"])?;

    for target in &results.targets {
        for port in &target.ports {
            wtr.write_record([
                target.target.as_str(),
                target.ip_address.as_str(),
                port.port.to_string().as_str(),
                port.state.to_string().as_str(),
                port.service.as_str(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures;

    #[test]
    fn test_csv_rows() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &fixtures::results()).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            ["target,ip,port,state,service", "router,192.168.1.1,22,open,ssh"]
        );
    }
}
