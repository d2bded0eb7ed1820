//! Prometheus metrics for the gossip node.
//!
//! The gossip service keeps its own lock-free counters; [`NodeMetrics`]
//! mirrors a snapshot of them into a dedicated [`Registry`] on every
//! sampling tick, together with gauges for cache size, queue workers and
//! consensus progress. The registry can be encoded into the Prometheus
//! text exposition format with [`NodeMetrics::encode_text`].

use std::collections::HashMap;

use prometheus::{
    register_int_gauge_vec_with_registry, register_int_gauge_with_registry, Encoder, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use quorum_network::Heights;

use crate::NodeError;

/// One sample of the gossip service's observable state.
#[derive(Clone, Debug, Default)]
pub struct GossipSample {
    pub events: HashMap<&'static str, u64>,
    pub dedup_entries: usize,
    pub active_workers: usize,
    pub committee_size: usize,
    pub progress: Heights,
}

pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    /// Gossip event totals, labelled by event name.
    pub gossip_events: IntGaugeVec,
    /// Digests currently held by the dedup cache.
    pub dedup_entries: IntGauge,
    /// Queue workers currently active or draining.
    pub active_workers: IntGauge,
    /// Members of the current committee, self included.
    pub committee_size: IntGauge,
    pub block_height: IntGauge,
    pub key_block_height: IntGauge,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Result<Self, NodeError> {
        let registry = Registry::new();

        let gossip_events = register_int_gauge_vec_with_registry!(
            Opts::new("quorum_gossip_events", "Gossip events since start"),
            &["event"],
            registry
        )?;

        let dedup_entries = register_int_gauge_with_registry!(
            Opts::new(
                "quorum_dedup_entries",
                "Message digests held by the dedup cache"
            ),
            registry
        )?;

        let active_workers = register_int_gauge_with_registry!(
            Opts::new(
                "quorum_active_queue_workers",
                "Per-peer queue workers active or draining"
            ),
            registry
        )?;

        let committee_size = register_int_gauge_with_registry!(
            Opts::new("quorum_committee_size", "Members of the current committee"),
            registry
        )?;

        let block_height = register_int_gauge_with_registry!(
            Opts::new("quorum_block_height", "Highest committed block"),
            registry
        )?;

        let key_block_height = register_int_gauge_with_registry!(
            Opts::new("quorum_key_block_height", "Highest committed key block"),
            registry
        )?;

        Ok(Self {
            registry,
            gossip_events,
            dedup_entries,
            active_workers,
            committee_size,
            block_height,
            key_block_height,
        })
    }

    /// Overwrite every gauge with `sample`.
    pub fn record(&self, sample: &GossipSample) {
        for (event, count) in &sample.events {
            self.gossip_events
                .with_label_values(&[*event])
                .set(saturating_i64(*count));
        }
        self.dedup_entries.set(saturating_i64(sample.dedup_entries as u64));
        self.active_workers.set(saturating_i64(sample.active_workers as u64));
        self.committee_size.set(saturating_i64(sample.committee_size as u64));
        self.block_height.set(saturating_i64(sample.progress.block));
        self.key_block_height.set(saturating_i64(sample.progress.key_block));
    }

    /// Encode the registry in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, NodeError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| NodeError::Config(e.to_string()))
    }
}

fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sets_every_gauge() {
        let metrics = NodeMetrics::new().unwrap();
        let sample = GossipSample {
            events: HashMap::from([("delivered", 7), ("duplicate", 2)]),
            dedup_entries: 5,
            active_workers: 3,
            committee_size: 4,
            progress: Heights::new(12, 3),
        };
        metrics.record(&sample);

        assert_eq!(
            metrics.gossip_events.with_label_values(&["delivered"]).get(),
            7
        );
        assert_eq!(metrics.dedup_entries.get(), 5);
        assert_eq!(metrics.active_workers.get(), 3);
        assert_eq!(metrics.block_height.get(), 12);
        assert_eq!(metrics.key_block_height.get(), 3);
    }

    #[test]
    fn text_encoding_names_the_metrics() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.record(&GossipSample::default());
        metrics.dedup_entries.set(9);
        let text = metrics.encode_text().unwrap();
        assert!(text.contains("quorum_dedup_entries 9"));
        assert!(text.contains("quorum_committee_size"));
    }

    #[test]
    fn huge_counts_saturate() {
        assert_eq!(saturating_i64(u64::MAX), i64::MAX);
    }
}
