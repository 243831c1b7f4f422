//! Probe Configuration
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./fipsprobe.yaml` (current directory - highest priority)
//! 2. `~/.fipsprobe.yaml` (home directory)
//! 3. `~/.config/fips/fipsprobe.yaml` (user config directory)
//! 4. `/etc/fips/fipsprobe.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority
//! files. An explicit config directory replaces the whole cascade.
//!
//! # YAML Structure
//!
//! ```yaml
//! probe:
//!   size: 16
//!   poll_interval_ms: 100
//! shared_instance:
//!   addr: "127.0.0.1:37428"
//!   mtu: 500
//! ```

mod transport;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use transport::SharedInstanceConfig;

/// Default config filename.
const CONFIG_FILENAME: &str = "fipsprobe.yaml";

/// Default probe payload size in bytes.
pub const DEFAULT_PROBE_SIZE: usize = 16;

/// Default interval between path and receipt polls.
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Probe behaviour (`probe.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Payload size in bytes (`probe.size`). Defaults to 16.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,

    /// Poll interval in milliseconds (`probe.poll_interval_ms`). Defaults to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
}

impl ProbeConfig {
    /// Get the payload size, using default if not configured.
    pub fn size(&self) -> usize {
        self.size.unwrap_or(DEFAULT_PROBE_SIZE)
    }

    /// Get the poll interval, using default if not configured.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    fn merge(&mut self, other: ProbeConfig) {
        if other.size.is_some() {
            self.size = other.size;
        }
        if other.poll_interval_ms.is_some() {
            self.poll_interval_ms = other.poll_interval_ms;
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Probe behaviour (`probe.*`).
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Shared instance connection (`shared_instance.*`).
    #[serde(default)]
    pub shared_instance: SharedInstanceConfig,
}

impl Config {
    /// Create a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Returns a tuple of (config, paths_loaded) where paths_loaded contains
    /// the paths that were successfully loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from an explicit directory only.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_from_dir(dir: &Path) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        Self::load_from_paths(&[dir.join(CONFIG_FILENAME)])
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding earlier ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let file_config = Self::load_file(path)?;
                config.merge(file_config);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
    }

    /// Load configuration from a single file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System config (lowest priority)
        paths.push(PathBuf::from("/etc/fips").join(CONFIG_FILENAME));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("fips").join(CONFIG_FILENAME));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".fipsprobe.yaml"));
        }

        // Current directory (highest priority)
        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Config) {
        self.probe.merge(other.probe);
        self.shared_instance.merge(other.shared_instance);
    }

    /// Serialize this configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
