//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use quorum_network::GossipConfig;

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a gossip node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Socket address the peer listener binds to.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Address other committee members know this node by. Sent in every
    /// outbound frame and used to recognise self in the committee.
    #[serde(default = "default_self_address")]
    pub self_address: String,

    /// Addresses of the other committee members. `self_address` is always
    /// part of the committee, listed here or not.
    #[serde(default)]
    pub committee: Vec<String>,

    /// Gossip, queue and heartbeat tunables.
    #[serde(default)]
    pub gossip: GossipConfig,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to mirror gossip statistics into Prometheus gauges.
    #[serde(default)]
    pub enable_metrics: bool,

    /// How often the metrics task samples the service.
    #[serde(default = "default_metrics_interval_ms")]
    pub metrics_interval_ms: u64,

    /// Timeout for dialling a committee member.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_listen_address() -> String {
    "0.0.0.0:7100".to_string()
}

fn default_self_address() -> String {
    "127.0.0.1:7100".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_interval_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            NodeError::Config(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Check the settings a node cannot start without.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.self_address.is_empty() {
            return Err(NodeError::Config("self_address must be set".into()));
        }
        if self.listen_address.is_empty() {
            return Err(NodeError::Config("listen_address must be set".into()));
        }
        if self.committee.iter().any(|m| m.is_empty()) {
            return Err(NodeError::Config("committee entries must be non-empty".into()));
        }
        self.log_format()?;
        self.gossip.validate()?;
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            self_address: default_self_address(),
            committee: Vec::new(),
            gossip: GossipConfig::default(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            metrics_interval_ms: default_metrics_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}
