//! Application settings and paths.
//!
//! Resolves the XDG config directory and loads `settings.json` from it.

use crate::error::{ConfigError, ConfigResult};
use crate::output::OutputFormat;
use crate::scanner::{ScanConfig, DEFAULT_DISCOVERY_PORTS};
use crate::types::{Port, TargetSpec};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/sweep)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the configuration directory. Nothing is created on disk.
    pub fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("com", "sweep", "sweep").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Defaults for a scan run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum simultaneous probes.
    pub concurrency: usize,
    /// Connect timeout in milliseconds.
    pub timeout_ms: u64,
    /// Banner read timeout in milliseconds.
    pub banner_timeout_ms: u64,
    /// Discovery connect timeout in milliseconds.
    pub discovery_timeout_ms: u64,
    /// Ports probed to decide whether a host is alive.
    pub discovery_ports: Vec<Port>,
    /// Stop discovery on a host at its first open port.
    pub discovery_early_exit: bool,
    /// Skip liveness probing and scan every target.
    pub assume_alive: bool,
    /// Probes per second, 0 for unlimited.
    pub rate_limit: u32,
    /// Largest CIDR block that will be expanded.
    pub max_hosts: u64,
    /// Default output format.
    pub output_format: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency: 50,
            timeout_ms: 1000,
            banner_timeout_ms: 500,
            discovery_timeout_ms: 500,
            discovery_ports: DEFAULT_DISCOVERY_PORTS
                .iter()
                .filter_map(|&p| Port::new(p))
                .collect(),
            discovery_early_exit: true,
            assume_alive: false,
            rate_limit: 0,
            max_hosts: TargetSpec::MAX_CIDR_HOSTS,
            output_format: OutputFormat::Plain,
        }
    }
}

impl Settings {
    /// Load settings from the default location, or defaults if there is no
    /// settings file yet.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file, which must exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Engine configuration from these settings. Banner grabbing is off
    /// unless requested on the command line.
    pub fn to_scan_config(&self) -> ScanConfig {
        ScanConfig {
            concurrency: self.concurrency,
            timeout: Duration::from_millis(self.timeout_ms),
            grab_banners: false,
            banner_timeout: Duration::from_millis(self.banner_timeout_ms),
            discovery_ports: self.discovery_ports.clone(),
            discovery_timeout: Duration::from_millis(self.discovery_timeout_ms),
            discovery_early_exit: self.discovery_early_exit,
            rate_limit: self.rate_limit,
            assume_alive: self.assume_alive,
        }
    }
}
