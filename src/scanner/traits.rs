//! Prober trait abstraction.
//!
//! A `Prober` performs exactly one bounded connection attempt and classifies
//! what happened. The engine only ever talks to this trait, which lets tests
//! drive it with deterministic mock outcomes.

use crate::types::Port;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Handshake completed; something is listening.
    Open,
    /// Connection actively refused.
    Closed,
    /// No answer before the timeout. A firewall drop and a slow host look
    /// the same from here.
    Filtered,
    /// Any other transport failure.
    Error,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Result of probing one (host, port) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub host: Ipv4Addr,
    pub port: Port,
    pub status: ProbeStatus,
    /// Banner text, only ever present on open ports.
    pub banner: Option<String>,
    /// Wall-clock time spent on the attempt.
    pub elapsed: Duration,
    /// Diagnostic cause for `ProbeStatus::Error`.
    pub error: Option<String>,
}

impl ProbeOutcome {
    fn with_status(host: Ipv4Addr, port: Port, status: ProbeStatus, elapsed: Duration) -> Self {
        Self {
            host,
            port,
            status,
            banner: None,
            elapsed,
            error: None,
        }
    }

    pub fn open(host: Ipv4Addr, port: Port, elapsed: Duration) -> Self {
        Self::with_status(host, port, ProbeStatus::Open, elapsed)
    }

    pub fn closed(host: Ipv4Addr, port: Port, elapsed: Duration) -> Self {
        Self::with_status(host, port, ProbeStatus::Closed, elapsed)
    }

    pub fn filtered(host: Ipv4Addr, port: Port, elapsed: Duration) -> Self {
        Self::with_status(host, port, ProbeStatus::Filtered, elapsed)
    }

    pub fn error(host: Ipv4Addr, port: Port, elapsed: Duration, cause: impl Into<String>) -> Self {
        Self {
            error: Some(cause.into()),
            ..Self::with_status(host, port, ProbeStatus::Error, elapsed)
        }
    }

    /// Attach a banner. Ignored unless the outcome is open.
    pub fn with_banner(mut self, banner: Option<String>) -> Self {
        if self.is_open() {
            self.banner = banner;
        }
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == ProbeStatus::Open
    }
}

/// Per-call knobs for a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Upper bound on the connect attempt.
    pub connect_timeout: Duration,
    /// When set, read a banner for at most this long after connecting.
    pub banner_timeout: Option<Duration>,
}

impl ProbeOptions {
    /// Connect only, no banner read.
    pub const fn connect(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            banner_timeout: None,
        }
    }

    /// Connect, then read a banner for up to `wait`.
    pub fn with_banner(mut self, wait: Duration) -> Self {
        self.banner_timeout = Some(wait);
        self
    }

    pub const fn wants_banner(&self) -> bool {
        self.banner_timeout.is_some()
    }
}

/// Trait for connection probers.
///
/// Implementations must open at most one socket per call, never retry, and
/// return within the configured timeouts. Failures are reported through the
/// outcome's status, never as a panic or error.
///
/// # Example
///
/// ```ignore
/// use sweep::scanner::{Prober, ProbeOptions, TcpConnectProber};
///
/// let outcome = TcpConnectProber
///     .probe(host, port, &ProbeOptions::connect(Duration::from_secs(1)))
///     .await;
/// ```
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, host: Ipv4Addr, port: Port, options: &ProbeOptions) -> ProbeOutcome;
}
