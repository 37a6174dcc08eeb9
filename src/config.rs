// src/config.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Sizes and durations for one consumption cycle. Zero skips a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadProfile {
    pub ram_mb: u64,            // Default: 5120 MB, held for the process lifetime
    pub cpu_duration_secs: u64, // Default: 20 seconds
    pub disk_mb: u64,           // Default: 100 MB
    pub net_duration_secs: u64, // Default: 30 seconds
}

impl Default for LoadProfile {
    fn default() -> Self {
        LoadProfile {
            ram_mb: 5 * 1024,
            cpu_duration_secs: 20,
            disk_mb: 100,
            net_duration_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub profile: LoadProfile,

    // Network job
    pub net_url: String,
    pub request_timeout_secs: u64, // Default: 10
    pub network_retry_secs: u64,   // Default: 1

    // Disk job
    pub scratch_dir: PathBuf, // Default: system temp dir

    // Cycle pacing
    pub success_pause_secs: u64, // Default: 5
    pub failure_pause_secs: u64, // Default: 60
    pub cycle_limit: Option<u64>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            profile: LoadProfile::default(),
            net_url: "https://httpbin.org/bytes/10485760".to_string(),
            request_timeout_secs: 10,
            network_retry_secs: 1,
            scratch_dir: std::env::temp_dir(),
            success_pause_secs: 5,
            failure_pause_secs: 60,
            cycle_limit: None,
        }
    }
}

impl LoadConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn network_retry(&self) -> Duration {
        Duration::from_secs(self.network_retry_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub endpoint: String,  // Docker Engine API over TCP
    pub container: String, // Name or id of the container running the load generator
    pub history_capacity: usize,
    pub record_path: Option<PathBuf>,
    pub replay_interval_ms: u64, // Default: 900, the dashboard refresh period
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            endpoint: "http://127.0.0.1:2375".to_string(),
            container: "billingsimulation_live".to_string(),
            history_capacity: 200,
            record_path: None,
            replay_interval_ms: 900,
        }
    }
}

impl MonitorConfig {
    /// Where recordings go when no path is configured.
    pub fn default_record_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("billing-sim");
        path.push("usage.jl");
        path
    }

    pub fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub load: LoadConfig,
    pub monitor: MonitorConfig,
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

lazy_static! {
    pub static ref DEFAULT_CONFIG: Config = Config::default();
}
