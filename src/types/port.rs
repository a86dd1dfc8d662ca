//! Port types and the port specification resolver.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortSpec` parses user input and `PortDomain` is the resolved,
//! deduplicated sequence handed to the scan engine.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None if invalid.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| PortError::InvalidPort(value.to_string()))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Error type for port parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("invalid port '{0}' (expected 1-65535)")]
    InvalidPort(String),
    #[error("invalid port range '{0}' (expected low-high with 1 <= low <= high <= 65535)")]
    InvalidPortRange(String),
    #[error("empty port specification")]
    Empty,
}

/// Well-known ports scanned when no port specification is given.
pub const DEFAULT_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 139, 143, 443, 445, 993, 995, 3306, 3389, 5432, 8080, 8443,
];

/// An inclusive range of ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: Port,
    end: Port,
}

impl PortRange {
    /// Create a new port range; `start` must not exceed `end`.
    pub fn new(start: Port, end: Port) -> Result<Self, PortError> {
        if start > end {
            Err(PortError::InvalidPortRange(format!("{}-{}", start, end)))
        } else {
            Ok(Self { start, end })
        }
    }

    /// A range containing a single port.
    pub const fn single(port: Port) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    /// Number of ports in this range.
    pub const fn len(&self) -> usize {
        (self.end.0 - self.start.0) as usize + 1
    }

    /// A valid range always holds at least one port.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over all ports in this range, ascending.
    pub fn iter(&self) -> impl Iterator<Item = Port> {
        (self.start.0..=self.end.0).map(Port)
    }

    fn parse_bounds(part: &str) -> Result<Self, PortError> {
        let invalid = || PortError::InvalidPortRange(part.to_string());

        let (low, high) = part.split_once('-').ok_or_else(invalid)?;
        let low: u16 = low.trim().parse().map_err(|_| invalid())?;
        let high: u16 = high.trim().parse().map_err(|_| invalid())?;

        let low = Port::new(low).ok_or_else(invalid)?;
        let high = Port::new(high).ok_or_else(invalid)?;
        Self::new(low, high).map_err(|_| invalid())
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A parsed port specification.
///
/// Supports formats like:
/// - Single port: "80"
/// - Comma-separated: "80,443,22"
/// - Range: "1-1000"
/// - Comma-separated entries may themselves be ranges: "22,8000-8010"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    ranges: Vec<PortRange>,
}

impl PortSpec {
    /// The documented default set of well-known ports.
    pub fn defaults() -> Self {
        Self {
            ranges: DEFAULT_PORTS
                .iter()
                .filter_map(|&p| Port::new(p))
                .map(PortRange::single)
                .collect(),
        }
    }

    /// Resolve an optional specification: `None` selects the default set.
    pub fn resolve(spec: Option<&str>) -> Result<PortDomain, PortError> {
        match spec {
            Some(s) => Ok(s.parse::<Self>()?.to_domain()),
            None => Ok(Self::defaults().to_domain()),
        }
    }

    /// Expand into the Port Domain: first-seen order, duplicates removed.
    pub fn to_domain(&self) -> PortDomain {
        PortDomain::from_ports(self.ranges.iter().flat_map(|r| r.iter()))
    }
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PortError::Empty);
        }

        let mut ranges = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(PortError::InvalidPort(part.to_string()));
            }

            if part.contains('-') {
                ranges.push(PortRange::parse_bounds(part)?);
            } else {
                let port = part
                    .parse::<u16>()
                    .ok()
                    .and_then(Port::new)
                    .ok_or_else(|| PortError::InvalidPort(part.to_string()))?;
                ranges.push(PortRange::single(port));
            }
        }

        Ok(Self { ranges })
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// The resolved, immutable sequence of ports for one scan run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortDomain(Vec<Port>);

impl PortDomain {
    /// Build a domain from ports, keeping the first occurrence of each.
    pub fn from_ports(ports: impl IntoIterator<Item = Port>) -> Self {
        let mut seen = HashSet::new();
        Self(ports.into_iter().filter(|p| seen.insert(*p)).collect())
    }

    pub fn as_slice(&self) -> &[Port] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Port> + '_ {
        self.0.iter().copied()
    }
}
