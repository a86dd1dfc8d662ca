//! Scanner module - host discovery and TCP port scanning.
//!
//! The `Prober` trait is the seam between the engine and the network. The
//! engine owns scheduling, bounding and aggregation; probers only classify a
//! single connection attempt.

mod engine;
mod rate_limiter;
mod sink;
pub mod tcp;
mod traits;

pub use engine::{Phase, ScanConfig, ScanEngine, ServiceLookup, DEFAULT_DISCOVERY_PORTS};
pub use rate_limiter::RateLimiter;
pub use sink::{OutcomeSink, Tally};
pub use tcp::TcpConnectProber;
pub use traits::{ProbeOptions, ProbeOutcome, ProbeStatus, Prober};
