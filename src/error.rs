//! Error types for sweep.
//!
//! Uses `thiserror` for ergonomic error definitions. Per-probe failures are
//! not errors at this level: they are classified into probe outcomes by the
//! prober and only counted by the engine.

use crate::scanner::Phase;
use crate::types::{PortError, TargetError};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors of a scan run. None of these produce a partial report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("target domain is empty: nothing to scan")]
    EmptyTargetDomain,

    #[error("port domain is empty: nothing to scan")]
    EmptyPortDomain,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("illegal phase transition {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("scan engine has already been run")]
    AlreadyRun,
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors loading the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine a configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid settings file: {0}")]
    InvalidFormat(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level error for the command-line front end.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write results to {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CliResult<T> = Result<T, CliError>;
