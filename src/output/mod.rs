//! Output formatting module.
//!
//! Renders a finished `ScanReport` as plain text, JSON or CSV, to stdout or
//! to a results file. Nothing here feeds back into the engine.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::write_csv;
pub use json_format::write_json;
pub use plain::{
    print_error, print_info, print_scan_header, print_success, print_warning, write_plain,
    write_results_file,
};

use crate::report::ScanReport;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl OutputFormat {
    /// Formats meant for other programs to consume.
    pub fn is_machine_readable(self) -> bool {
        !matches!(self, Self::Plain)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Print the report to stdout in the given format.
pub fn print_report(report: &ScanReport, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Plain => write_plain(&mut out, report),
        OutputFormat::Json => write_json(&mut out, report),
        OutputFormat::Csv => write_csv(&mut out, report),
    }
}

/// Write the report to `path`. Plain output uses the colour-free results
/// file layout.
pub fn save_report(report: &ScanReport, format: OutputFormat, path: &Path) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    match format {
        OutputFormat::Plain => write_results_file(&mut out, report, Local::now().naive_local())?,
        OutputFormat::Json => write_json(&mut out, report)?,
        OutputFormat::Csv => write_csv(&mut out, report)?,
    }
    out.flush()
}
