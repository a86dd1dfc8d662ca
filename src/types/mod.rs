//! Core type definitions using newtype patterns for type safety.
//!
//! Target and port specifications are parsed here and resolved into the
//! immutable domains the scan engine works over.

mod port;
mod run_id;
mod target;

pub use port::{Port, PortDomain, PortError, PortRange, PortSpec, DEFAULT_PORTS};
pub use run_id::RunId;
pub use target::{expand_cidr, TargetDomain, TargetError, TargetSpec};
