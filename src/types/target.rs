//! Target specification parsing and expansion.
//!
//! Provides target parsing supporting:
//! - Single IPv4 addresses (192.168.1.1)
//! - CIDR notation (192.168.1.0/24)
//! - Hostnames (example.com), resolved through the system resolver

use ipnetwork::Ipv4Network;
use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use trust_dns_resolver::TokioAsyncResolver;

/// Error type for target parsing and resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("failed to resolve hostname '{0}': {1}")]
    ResolutionError(String, String),
    #[error("no IPv4 addresses found for hostname '{0}'")]
    NoAddresses(String),
    #[error("CIDR range too large: {0} addresses (max: {1})")]
    CidrTooLarge(u64, u64),
}

/// A target specification as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// A single IPv4 address.
    Single(Ipv4Addr),
    /// An IPv4 network block.
    Cidr(Ipv4Network),
    /// A hostname to be resolved.
    Hostname(String),
}

impl TargetSpec {
    /// Default cap on addresses produced by a CIDR block (a /16).
    pub const MAX_CIDR_HOSTS: u64 = 65536;

    /// Parse a target specification from a string.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();

        if s.contains('/') {
            return s
                .parse::<Ipv4Network>()
                .map(Self::Cidr)
                .map_err(|_| TargetError::InvalidCidr(s.to_string()));
        }

        if let Ok(ip) = s.parse::<Ipv4Addr>() {
            return Ok(Self::Single(ip));
        }

        // Dotted digits that failed to parse, or IPv6, are malformed
        // addresses rather than hostnames.
        let looks_numeric = !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.');
        if looks_numeric || s.contains(':') || !is_valid_hostname(s) {
            return Err(TargetError::InvalidAddress(s.to_string()));
        }

        Ok(Self::Hostname(s.to_string()))
    }

    /// Expand this specification into the Target Domain.
    ///
    /// CIDR blocks yield every address in the block, network and broadcast
    /// included, in ascending order. Blocks larger than `max_hosts` are
    /// rejected before anything is allocated.
    pub async fn expand(&self, max_hosts: u64) -> Result<TargetDomain, TargetError> {
        match self {
            Self::Single(ip) => Ok(TargetDomain::from_addrs([*ip])),
            Self::Cidr(network) => expand_cidr(*network, max_hosts),
            Self::Hostname(hostname) => resolve_hostname(hostname).await,
        }
    }
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{}", ip),
            Self::Cidr(network) => write!(f, "{}", network),
            Self::Hostname(hostname) => write!(f, "{}", hostname),
        }
    }
}

/// The resolved, immutable sequence of IPv4 hosts for one scan run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetDomain(Vec<Ipv4Addr>);

impl TargetDomain {
    /// Build a domain from addresses, keeping the first occurrence of each.
    pub fn from_addrs(addrs: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        let mut seen = HashSet::new();
        Self(addrs.into_iter().filter(|a| seen.insert(*a)).collect())
    }

    pub fn as_slice(&self) -> &[Ipv4Addr] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.0.iter().copied()
    }
}

fn block_size(network: &Ipv4Network) -> u64 {
    1u64 << (32 - u32::from(network.prefix()))
}

/// Enumerate every address of `network` in ascending numeric order.
pub fn expand_cidr(network: Ipv4Network, max_hosts: u64) -> Result<TargetDomain, TargetError> {
    let size = block_size(&network);
    if size > max_hosts {
        return Err(TargetError::CidrTooLarge(size, max_hosts));
    }

    let first = u64::from(u32::from(network.network()));
    Ok(TargetDomain(
        (first..first + size)
            .map(|n| Ipv4Addr::from(n as u32))
            .collect(),
    ))
}

async fn resolve_hostname(hostname: &str) -> Result<TargetDomain, TargetError> {
    let resolution_error = |e: &dyn fmt::Display| {
        TargetError::ResolutionError(hostname.to_string(), e.to_string())
    };

    let resolver = TokioAsyncResolver::tokio_from_system_conf().map_err(|e| resolution_error(&e))?;
    let response = resolver
        .lookup_ip(hostname)
        .await
        .map_err(|e| resolution_error(&e))?;

    let domain = TargetDomain::from_addrs(response.iter().filter_map(|ip| match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    }));

    if domain.is_empty() {
        return Err(TargetError::NoAddresses(hostname.to_string()));
    }

    tracing::debug!(hostname, addresses = domain.len(), "resolved hostname");
    Ok(domain)
}

/// Check if a string is a syntactically valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}
