//! Scan command implementation.
//!
//! Resolves the target and ports, runs the engine and renders the report.

use crate::config::Settings;
use crate::error::{CliError, CliResult};
use crate::output::{self, OutputFormat};
use crate::report::ScanReport;
use crate::scanner::{ScanConfig, ScanEngine, TcpConnectProber};
use crate::types::{PortSpec, TargetSpec};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Scan options. Anything left unset falls back to the settings file.
#[derive(Args, Debug)]
pub struct ScanCommand {
    /// Target to scan (IPv4 address, hostname, or CIDR block)
    ///
    /// Examples:
    ///   192.168.1.1        Single IP address
    ///   example.com        Hostname
    ///   192.168.1.0/24     CIDR range
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Ports to scan (e.g., "80", "80,443", "1-1000", "22,80,8000-9000")
    ///
    /// Defaults to a built-in list of common service ports.
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Grab service banners from open ports
    #[arg(short = 'b', long)]
    pub banner: bool,

    /// Save results to a file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format for results
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Maximum number of simultaneous probes
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Connection timeout in milliseconds
    #[arg(short, long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Banner read timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub banner_timeout: Option<u64>,

    /// Discovery connection timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub discovery_timeout: Option<u64>,

    /// Ports probed to decide whether a host is alive
    #[arg(long, value_name = "LIST")]
    pub discovery_ports: Option<String>,

    /// Probe every discovery port even after one answers
    #[arg(long)]
    pub no_early_exit: bool,

    /// Skip host discovery and treat every target as alive
    #[arg(long)]
    pub no_discovery: bool,

    /// Rate limit in probes per second (0 = unlimited)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,
}

impl ScanCommand {
    /// Merge flags over `settings` into an engine configuration.
    pub fn scan_config(&self, settings: &Settings) -> CliResult<ScanConfig> {
        let mut config = settings.to_scan_config();

        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(ms) = self.timeout {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.banner_timeout {
            config.banner_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.discovery_timeout {
            config.discovery_timeout = Duration::from_millis(ms);
        }
        if let Some(list) = &self.discovery_ports {
            config.discovery_ports = PortSpec::resolve(Some(list))?.iter().collect();
        }
        if let Some(rate) = self.rate_limit {
            config.rate_limit = rate;
        }
        config.grab_banners = self.banner;
        if self.no_early_exit {
            config.discovery_early_exit = false;
        }
        if self.no_discovery {
            config.assume_alive = true;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn output_format(&self, settings: &Settings) -> OutputFormat {
        self.format.unwrap_or(settings.output_format)
    }

    /// Execute the scan and render its report.
    pub async fn execute(&self, settings: &Settings, quiet: bool) -> CliResult<ScanReport> {
        let format = self.output_format(settings);
        let config = self.scan_config(settings)?;

        let target_spec = TargetSpec::parse(&self.target)?;
        let targets = target_spec.expand(settings.max_hosts).await?;
        let ports = PortSpec::resolve(self.ports.as_deref())?;
        debug!(hosts = targets.len(), ports = ports.len(), ?config, "resolved scan inputs");

        let chatty = !quiet && !format.is_machine_readable();
        if chatty {
            output::print_scan_header(&self.target, targets.len(), ports.len());
        }

        let cancel = CancellationToken::new();
        let interrupt = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, finishing in-flight probes");
                    cancel.cancel();
                }
            }
        });

        let mut engine = ScanEngine::new(TcpConnectProber::new()).with_cancellation(cancel);
        if chatty {
            engine = engine.with_progress(progress_bar());
        }

        let result = engine.run(&targets, &ports, &config).await;
        interrupt.abort();
        let report = result?;

        if chatty {
            output::print_info(&format!(
                "Found {} live hosts out of {}",
                report.summary.hosts_alive, report.summary.hosts_scanned
            ));
        }
        output::print_report(&report, format)?;

        if let Some(path) = &self.output {
            output::save_report(&report, format, path).map_err(|source| CliError::Output {
                path: path.clone(),
                source,
            })?;
            if chatty {
                output::print_success(&format!("Results saved to {}", path.display()));
            }
        }

        if report.partial && !quiet {
            output::print_warning("scan was interrupted; the report is partial");
        }

        Ok(report)
    }
}

fn progress_bar() -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    )
    .map(|s| s.progress_chars("=>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let pb = ProgressBar::new(0);
    pb.set_style(style);
    pb
}
