use std::path::Path;
use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};
use lvs_model::protocol::IPVSADM;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ipvsadm: IpvsadmConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Connection sync daemon, only started when present
    #[serde(default)]
    pub sync: Option<SyncConfig>,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpvsadmConfig {
    #[serde(default = "default_path")]
    pub path: String,
    /// Upper bound on a single invocation
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Re-read the table after each delete to confirm it took effect
    #[serde(default)]
    pub verify_deletes: bool,
}

/// Connection timeouts in seconds, 0 leaves the kernel value alone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default)]
    pub tcp: u32,
    #[serde(default)]
    pub tcp_fin: u32,
    #[serde(default)]
    pub udp: u32,
}

impl TimeoutConfig {
    pub fn is_unset(&self) -> bool {
        self.tcp == 0 && self.tcp_fin == 0 && self.udp == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Multicast interface the sync daemons bind to
    pub interface: String,
    /// 0 leaves the sync id unset
    #[serde(default)]
    pub sync_id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    /// How often the mirror is rebuilt from the live table, 0 disables
    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,
}

fn default_path() -> String {
    IPVSADM.to_string()
}

fn default_command_timeout() -> u64 {
    10
}

fn default_reconcile_interval() -> u64 {
    60
}

impl Default for IpvsadmConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            command_timeout_secs: default_command_timeout(),
            verify_deletes: false,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_interval(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}
