//! Tunables for the gossip layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::NetworkError;

/// Gossip, queue and heartbeat settings.
///
/// Every field has a default, so an empty `[gossip]` table in the node's
/// TOML file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipConfig {
    /// A peer with no acknowledgment for longer than this is overdue.
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    /// Fan-out is `committee_size * fanout_percent / 100 + 1` peers.
    #[serde(default = "default_fanout_percent")]
    pub fanout_percent: u32,

    /// Idle-wait of a queue worker with nothing to send or a saturated peer.
    #[serde(default = "default_queue_poll_interval_ms")]
    pub queue_poll_interval_ms: u64,

    /// Pause between two heartbeat scans of the committee.
    #[serde(default = "default_heartbeat_scan_interval_ms")]
    pub heartbeat_scan_interval_ms: u64,

    /// A queue worker holds back while the transport reports more than
    /// this many sends in flight to its peer.
    #[serde(default = "default_max_in_flight_per_peer")]
    pub max_in_flight_per_peer: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_heartbeat_timeout_ms() -> u64 {
    3_000
}

fn default_fanout_percent() -> u32 {
    40
}

fn default_queue_poll_interval_ms() -> u64 {
    5
}

fn default_heartbeat_scan_interval_ms() -> u64 {
    200
}

fn default_max_in_flight_per_peer() -> usize {
    1
}

// ── Impl ───────────────────────────────────────────────────────────────

impl GossipConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    pub fn heartbeat_scan_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_scan_interval_ms)
    }

    /// Number of peers a single broadcast targets for a committee of
    /// `committee_size` members (self included).
    pub fn fanout_size(&self, committee_size: usize) -> usize {
        fanout_size(committee_size, self.fanout_percent)
    }

    /// Reject settings that would spin a worker or exceed the committee.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.fanout_percent > 100 {
            return Err(NetworkError::Config(format!(
                "fanout_percent must be at most 100, got {}",
                self.fanout_percent
            )));
        }
        if self.queue_poll_interval_ms == 0 {
            return Err(NetworkError::Config(
                "queue_poll_interval_ms must be non-zero".into(),
            ));
        }
        if self.heartbeat_scan_interval_ms == 0 {
            return Err(NetworkError::Config(
                "heartbeat_scan_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            fanout_percent: default_fanout_percent(),
            queue_poll_interval_ms: default_queue_poll_interval_ms(),
            heartbeat_scan_interval_ms: default_heartbeat_scan_interval_ms(),
            max_in_flight_per_peer: default_max_in_flight_per_peer(),
        }
    }
}

/// `committee_size * percent / 100 + 1`.
pub fn fanout_size(committee_size: usize, percent: u32) -> usize {
    committee_size * percent as usize / 100 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fanout_is_forty_percent_plus_one() {
        let config = GossipConfig::default();
        assert_eq!(config.fanout_size(5), 3);
        assert_eq!(config.fanout_size(10), 5);
        assert_eq!(config.fanout_size(1), 1);
        assert_eq!(config.fanout_size(0), 1);
    }

    #[test]
    fn default_intervals() {
        let config = GossipConfig::default();
        assert_eq!(config.queue_poll_interval(), Duration::from_millis(5));
        assert_eq!(config.heartbeat_scan_interval(), Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: GossipConfig = toml::from_str("").expect("empty table is valid");
        assert_eq!(config, GossipConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config: GossipConfig = toml::from_str(
            r#"
                heartbeat_timeout_ms = 1000
                fanout_percent = 60
            "#,
        )
        .expect("should parse");
        assert_eq!(config.heartbeat_timeout(), Duration::from_secs(1));
        assert_eq!(config.fanout_size(5), 4);
        assert_eq!(config.queue_poll_interval_ms, 5);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = GossipConfig {
            fanout_percent: 101,
            ..GossipConfig::default()
        };
        assert!(matches!(config.validate(), Err(NetworkError::Config(_))));

        config.fanout_percent = 40;
        config.queue_poll_interval_ms = 0;
        assert!(config.validate().is_err());

        config.queue_poll_interval_ms = 5;
        config.heartbeat_scan_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
