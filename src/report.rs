//! The aggregated result of a scan run.
//!
//! A `ScanReport` is built once by the engine and is read-only afterwards.
//! It is plain serialisable data: rendering belongs to `output`.

use crate::types::{Port, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// One open port on a live host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPort {
    pub port: Port,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// Time to complete the handshake, in milliseconds.
    pub connect_ms: u64,
}

/// A live host and its open ports in ascending port order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostReport {
    pub address: Ipv4Addr,
    pub open_ports: Vec<OpenPort>,
}

impl HostReport {
    pub fn port(&self, port: u16) -> Option<&OpenPort> {
        self.open_ports.iter().find(|p| p.port.as_u16() == port)
    }
}

/// Run-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Hosts whose discovery finished.
    pub hosts_scanned: usize,
    pub hosts_alive: usize,
    pub discovery_probes: usize,
    /// Completed probes in the scanning phase.
    pub probes: usize,
    pub open_ports: usize,
    pub closed_ports: usize,
    pub filtered_ports: usize,
    pub errors: usize,
    pub elapsed_ms: u64,
}

/// Aggregated result of one scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Set when the run was cancelled before all work was submitted.
    pub partial: bool,
    /// Live hosts in discovery order.
    pub hosts: Vec<HostReport>,
    pub summary: ScanSummary,
}

impl ScanReport {
    pub fn host(&self, address: Ipv4Addr) -> Option<&HostReport> {
        self.hosts.iter().find(|h| h.address == address)
    }

    /// Every open (host, port) pair, in report order.
    pub fn open_endpoints(&self) -> impl Iterator<Item = (Ipv4Addr, &OpenPort)> + '_ {
        self.hosts
            .iter()
            .flat_map(|h| h.open_ports.iter().map(move |p| (h.address, p)))
    }

    /// One-line summary, e.g. for logs.
    pub fn summary_line(&self) -> String {
        let s = &self.summary;
        format!(
            "{} of {} hosts alive, {} open, {} closed, {} filtered, {} errors [{:.2}s]{}",
            s.hosts_alive,
            s.hosts_scanned,
            s.open_ports,
            s.closed_ports,
            s.filtered_ports,
            s.errors,
            s.elapsed_ms as f64 / 1000.0,
            if self.partial { " (partial)" } else { "" }
        )
    }
}
