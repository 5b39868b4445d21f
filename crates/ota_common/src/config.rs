//! Configuration for the otad agent.
//!
//! Loads settings from /etc/otad/config.toml or uses defaults. All values
//! are fixed for the life of the process; there is no runtime reload.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/otad/config.toml";

/// Fallback config file path
pub const FALLBACK_CONFIG_PATH: &str = "/var/lib/otad/config.toml";

/// Network link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network name to join before probing, when set
    #[serde(default)]
    pub ssid: Option<String>,

    /// Credential for the configured network
    #[serde(default)]
    pub psk: Option<String>,

    /// Reachability probe target (host:port)
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,

    /// Bound on link establishment, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_probe_addr() -> String {
    "1.1.1.1:443".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: None,
            psk: None,
            probe_addr: default_probe_addr(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Remote source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// URL of the plain-text version probe
    #[serde(default = "default_version_url")]
    pub version_url: String,

    /// URL of the program payload
    #[serde(default = "default_payload_url")]
    pub payload_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_version_url() -> String {
    "https://raw.githubusercontent.com/otad-project/firmware/main/version.txt".to_string()
}

fn default_payload_url() -> String {
    "https://raw.githubusercontent.com/otad-project/firmware/main/program.bin".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            version_url: default_version_url(),
            payload_url: default_payload_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Data directory holding the store objects
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Extra delay after a failed stage before the normal idle period.
    /// Zero keeps the cheap retry-every-cycle policy with no backoff.
    #[serde(default = "default_stage_retry_delay")]
    pub stage_retry_delay_secs: u64,
}

fn default_data_dir() -> String {
    "/var/lib/otad".to_string()
}

fn default_stage_retry_delay() -> u64 {
    0
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            stage_retry_delay_secs: default_stage_retry_delay(),
        }
    }
}

/// Heartbeat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Idle period between update checks, in seconds
    #[serde(default = "default_heartbeat_period")]
    pub period_secs: u64,

    /// Liveness pulse sub-interval, in seconds
    #[serde(default = "default_heartbeat_pulse")]
    pub pulse_secs: u64,

    /// Brightness file of an indicator LED, when the platform has one
    #[serde(default)]
    pub led_path: Option<String>,
}

fn default_heartbeat_period() -> u64 {
    180
}

fn default_heartbeat_pulse() -> u64 {
    5
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            period_secs: default_heartbeat_period(),
            pulse_secs: default_heartbeat_pulse(),
            led_path: None,
        }
    }
}

/// Full agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

impl Config {
    /// Load config from file, or return defaults
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_PATH)
            .or_else(|_| Self::load_from_path(FALLBACK_CONFIG_PATH))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                Config::default()
            })
    }

    /// Load config from specific path
    pub fn load_from_path(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path);
        Ok(config)
    }
}
