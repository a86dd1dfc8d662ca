//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting, plus the
//! colour-free layout used when saving results to a file.

use crate::report::ScanReport;
use crate::services::service_label;
use chrono::NaiveDateTime;
use console::style;
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Write the report in human-readable plain text format.
pub fn write_plain<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let summary = &report.summary;

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out, "                    {} Scan Results", style("Sweep").cyan().bold())?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Run ID:").bold(), style(report.run_id.short()).dim())?;
    writeln!(
        out,
        "  {} {} of {} hosts alive in {:.2}s",
        style("Hosts:").bold(),
        style(summary.hosts_alive).white().bold(),
        summary.hosts_scanned,
        summary.elapsed_ms as f64 / 1000.0
    )?;
    writeln!(
        out,
        "  {} {} open, {} closed, {} filtered, {} errors",
        style("Ports:").bold(),
        style(summary.open_ports).green().bold(),
        style(summary.closed_ports).red(),
        style(summary.filtered_ports).yellow(),
        summary.errors
    )?;
    if report.partial {
        writeln!(
            out,
            "  {}",
            style("Scan was interrupted; results are partial.").yellow().bold()
        )?;
    }
    writeln!(out)?;

    if report.hosts.is_empty() {
        writeln!(out, "  {}", style("No live hosts found.").dim())?;
    }

    for host in &report.hosts {
        writeln!(out, "  {} {}", style("Host:").blue().bold(), style(host.address).white().bold())?;
        writeln!(out, "  {}", style(THIN_RULE).dim())?;

        if host.open_ports.is_empty() {
            writeln!(out, "  {}", style("No open ports.").dim())?;
        } else {
            writeln!(
                out,
                "  {:>6}  {:<15}  {}",
                style("PORT").bold(),
                style("SERVICE").bold(),
                style("BANNER").bold()
            )?;
            for open in &host.open_ports {
                let banner = open
                    .banner
                    .as_deref()
                    .map(|b| truncate_string(b, 40))
                    .unwrap_or_default();
                writeln!(
                    out,
                    "  {:>6}  {:<15}  {}",
                    style(open.port).green().bold(),
                    service_label(open.service.as_deref()),
                    style(banner).dim()
                )?;
            }
        }
        writeln!(out)?;
    }

    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    Ok(())
}

/// Write the colour-free results file layout, stamped with `generated`.
pub fn write_results_file<W: Write>(
    out: &mut W,
    report: &ScanReport,
    generated: NaiveDateTime,
) -> io::Result<()> {
    writeln!(
        out,
        "Network Scan Results - {}",
        generated.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "{}", "=".repeat(60))?;
    if report.partial {
        writeln!(out, "(partial: scan was interrupted)")?;
    }
    writeln!(out)?;

    for host in &report.hosts {
        writeln!(out, "Host: {}", host.address)?;
        writeln!(out, "{}", "-".repeat(40))?;

        for open in &host.open_ports {
            let service = service_label(open.service.as_deref());
            match &open.banner {
                Some(banner) => writeln!(out, "  Port {}/tcp - {} - {}", open.port, service, banner)?,
                None => writeln!(out, "  Port {}/tcp - {}", open.port, service)?,
            }
        }
        writeln!(out)?;
    }

    Ok(())
}

/// Print a header before scanning begins.
pub fn print_scan_header(target: &str, hosts: usize, ports: usize) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("Sweep").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "{} Target: {} ({} hosts)",
        style("•").dim(),
        style(target).white().bold(),
        hosts
    );
    println!(
        "{} Scanning {} ports on each live host...",
        style("•").dim(),
        style(ports).white().bold()
    );
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to a maximum number of characters, adding ellipsis if
/// truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
