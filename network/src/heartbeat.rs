//! Periodic liveness scan that sends heartbeats to overdue peers.
//!
//! Heartbeats bypass the per-peer queues so they never wait behind gossip.
//! A peer gets at most one outstanding heartbeat, and none while the
//! transport still has anything in flight to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quorum_messages::{Envelope, HeartbeatMsg, Message};
use quorum_types::PeerAddress;
use tokio::time::Instant;

use crate::config::GossipConfig;
use crate::liveness::LivenessTracker;
use crate::progress::NodeProgress;
use crate::stats::{GossipStat, GossipStats};
use crate::traits::{Committee, CommitteeSource, Transport};

pub struct HeartbeatLoop<T, C> {
    transport: Arc<T>,
    committee: Arc<C>,
    liveness: Arc<LivenessTracker>,
    progress: Arc<NodeProgress>,
    stats: Arc<GossipStats>,
    timeout: Duration,
    scan_interval: Duration,
    running: Arc<AtomicBool>,
}

impl<T: Transport, C: CommitteeSource> HeartbeatLoop<T, C> {
    pub fn new(
        transport: Arc<T>,
        committee: Arc<C>,
        liveness: Arc<LivenessTracker>,
        progress: Arc<NodeProgress>,
        stats: Arc<GossipStats>,
        config: &GossipConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            committee,
            liveness,
            progress,
            stats,
            timeout: config.heartbeat_timeout(),
            scan_interval: config.heartbeat_scan_interval(),
            running,
        }
    }

    /// Scan the committee once per `scan_interval` until `running` is
    /// cleared. The pause follows every pass, whether or not any peer was
    /// overdue and whether or not a committee was available.
    pub async fn run(self) {
        tracing::debug!(
            timeout_ms = self.timeout.as_millis() as u64,
            interval_ms = self.scan_interval.as_millis() as u64,
            "heartbeat loop started"
        );
        while self.running.load(Ordering::Acquire) {
            match self.committee.current_committee() {
                Some(committee) => {
                    let sent = self.scan(&committee, Instant::now());
                    if !sent.is_empty() {
                        tracing::trace!(peers = sent.len(), "heartbeats sent");
                    }
                }
                None => tracing::trace!("no committee, skipping heartbeat scan"),
            }
            tokio::time::sleep(self.scan_interval).await;
        }
        tracing::debug!("heartbeat loop stopped");
    }

    /// One pass over `committee`. Starts a heartbeat to every non-self
    /// member that is overdue at `now`, idle on the transport, and has no
    /// heartbeat outstanding. Returns the peers a heartbeat was started for.
    pub fn scan(&self, committee: &Committee, now: Instant) -> Vec<PeerAddress> {
        let mut started = Vec::new();
        for member in committee.peers() {
            let peer = &member.address;
            if !self.liveness.is_overdue(peer, self.timeout, now) {
                continue;
            }
            if self.transport.in_flight(peer) > 0 {
                continue;
            }
            let Some(guard) = self.liveness.try_begin_heartbeat(peer) else {
                continue;
            };

            let envelope = Envelope::direct(Message::Heartbeat(HeartbeatMsg {
                block_number: self.progress.block_number(),
            }));
            let transport = Arc::clone(&self.transport);
            let stats = Arc::clone(&self.stats);
            let target = peer.clone();
            tokio::spawn(async move {
                let _guard = guard;
                match transport.send_direct(&target, &envelope).await {
                    Ok(()) => stats.increment(GossipStat::HeartbeatSent),
                    Err(e) => {
                        stats.increment(GossipStat::SendFailed);
                        tracing::debug!(peer = %target, error = %e, "heartbeat send failed");
                    }
                }
            });
            started.push(peer.clone());
        }
        started
    }
}
