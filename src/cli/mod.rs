//! Command-line interface definitions.
//!
//! `sweep <TARGET> [OPTIONS]` discovers live hosts in the target and scans
//! them for open TCP ports.

mod scan;

pub use crate::output::OutputFormat;
pub use scan::ScanCommand;

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Sweep - discover live hosts and scan them for open TCP ports.
///
/// Targets may be a single IPv4 address, a hostname, or a CIDR block.
/// Hosts that answer on any discovery port are then scanned on the
/// requested ports.
#[derive(Parser, Debug)]
#[command(name = "sweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Concurrent host discovery and TCP port scanner", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub scan: ScanCommand,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress the banner, progress bar and informational messages
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to a settings file to use instead of the default
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Log filter directive for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
