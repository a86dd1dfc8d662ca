//! Single-owner accumulation of scanning-phase outcomes.
//!
//! Workers never touch this structure. Completed outcomes flow back to the
//! engine's driving loop, which is the only caller of `record`, so the sink
//! needs no locking at all.

use crate::report::{HostReport, OpenPort, ScanSummary};
use crate::scanner::traits::{ProbeOutcome, ProbeStatus};
use crate::types::Port;
use std::net::Ipv4Addr;

/// Running tallies for the scanning phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub probes: usize,
    pub open: usize,
    pub closed: usize,
    pub filtered: usize,
    pub errors: usize,
}

impl Tally {
    fn count(&mut self, status: ProbeStatus) {
        self.probes += 1;
        match status {
            ProbeStatus::Open => self.open += 1,
            ProbeStatus::Closed => self.closed += 1,
            ProbeStatus::Filtered => self.filtered += 1,
            ProbeStatus::Error => self.errors += 1,
        }
    }
}

/// Collects open outcomes per live host; everything else is only counted.
#[derive(Debug)]
pub struct OutcomeSink {
    hosts: Vec<(Ipv4Addr, Vec<ProbeOutcome>)>,
    tally: Tally,
}

impl OutcomeSink {
    /// A sink for the given live hosts, in discovery order.
    pub fn new(live_hosts: &[Ipv4Addr]) -> Self {
        Self {
            hosts: live_hosts.iter().map(|&h| (h, Vec::new())).collect(),
            tally: Tally::default(),
        }
    }

    /// Record one outcome for the live host at `host_index`.
    pub fn record(&mut self, host_index: usize, outcome: ProbeOutcome) {
        self.tally.count(outcome.status);

        if outcome.status == ProbeStatus::Error {
            tracing::debug!(
                host = %outcome.host,
                port = %outcome.port,
                cause = outcome.error.as_deref().unwrap_or("unknown"),
                "probe error"
            );
        }

        if outcome.is_open() {
            if let Some((_, open)) = self.hosts.get_mut(host_index) {
                open.push(outcome);
            }
        }
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    /// Finish into per-host reports (open ports ascending) and a summary
    /// seeded with the scanning-phase counters.
    pub fn finish<F>(self, service_name: F) -> (Vec<HostReport>, ScanSummary)
    where
        F: Fn(Port) -> Option<String>,
    {
        let hosts = self
            .hosts
            .into_iter()
            .map(|(address, mut open)| {
                open.sort_by_key(|o| o.port);
                HostReport {
                    address,
                    open_ports: open
                        .into_iter()
                        .map(|o| OpenPort {
                            port: o.port,
                            service: service_name(o.port),
                            banner: o.banner,
                            connect_ms: o.elapsed.as_millis() as u64,
                        })
                        .collect(),
                }
            })
            .collect();

        let summary = ScanSummary {
            probes: self.tally.probes,
            open_ports: self.tally.open,
            closed_ports: self.tally.closed,
            filtered_ports: self.tally.filtered,
            errors: self.tally.errors,
            ..ScanSummary::default()
        };

        (hosts, summary)
    }
}
