//! # Sweep - Concurrent Host Discovery and Port Scanner
//!
//! Sweep finds live hosts in an IPv4 range and reports which TCP ports on
//! each of them accept connections, optionally capturing service banners.
//!
//! ## Features
//!
//! - **Two-phase scanning**: cheap discovery probes first, full port scans only on live hosts
//! - **Bounded concurrency**: one permit pool caps in-flight probes across both phases
//! - **Flexible Targeting**: Single IPs, hostnames, and CIDR ranges
//! - **Cancellation**: an interrupted run still yields a partial report
//! - **Banner Grabbing**: Service identification on open ports
//! - **Multiple Output Formats**: Plain text, JSON, and CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use sweep::scanner::{ScanConfig, ScanEngine, TcpConnectProber};
//! use sweep::types::{PortSpec, TargetSpec};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let targets = TargetSpec::parse("192.168.1.0/24")?
//!         .expand(TargetSpec::MAX_CIDR_HOSTS)
//!         .await?;
//!     let ports = PortSpec::resolve(Some("22,80,443"))?;
//!
//!     let mut engine = ScanEngine::new(TcpConnectProber::new());
//!     let report = engine.run(&targets, &ports, &ScanConfig::default()).await?;
//!
//!     for (host, open) in report.open_endpoints() {
//!         println!("{host}:{}", open.port);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, targets and their parsers
//! - [`scanner`] - The `Prober` seam, the TCP prober and the scan engine
//! - [`report`] - The aggregated, serialisable result of a run
//! - [`config`] - Settings file handling
//! - [`output`] - Plain, JSON and CSV rendering
//! - [`error`] - Error types

pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod report;
pub mod scanner;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use error::{CliError, ScanError};
pub use report::{HostReport, OpenPort, ScanReport, ScanSummary};
pub use scanner::{Phase, ProbeOutcome, ProbeStatus, Prober, ScanConfig, ScanEngine};
pub use types::{Port, PortDomain, PortSpec, RunId, TargetDomain, TargetSpec};
