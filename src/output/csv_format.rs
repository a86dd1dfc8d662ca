//! CSV output formatting.

use crate::report::ScanReport;
use crate::services::service_label;
use std::io::{self, Write};

/// Write one row per open port.
pub fn write_csv<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["host", "port", "service", "banner"])?;

    for (host, open) in report.open_endpoints() {
        wtr.write_record([
            &host.to_string(),
            &open.port.to_string(),
            service_label(open.service.as_deref()),
            open.banner.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
