//! The gossip service facade.
//!
//! [`NetService`] owns every piece of gossip state and is the only type the
//! node needs to talk to: inbound traffic goes through [`handle_frame`] or
//! [`handle_envelope`], outbound through [`broadcast`] and [`send_to`], and
//! consensus reports progress through [`on_block_committed`].
//!
//! [`handle_frame`]: NetService::handle_frame
//! [`handle_envelope`]: NetService::handle_envelope
//! [`broadcast`]: NetService::broadcast
//! [`send_to`]: NetService::send_to
//! [`on_block_committed`]: NetService::on_block_committed

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use quorum_messages::{Envelope, Message};
use quorum_types::PeerAddress;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::GossipConfig;
use crate::dedup::DedupCache;
use crate::gossip::{BroadcastOutcome, GossipEngine, InboundOutcome};
use crate::heartbeat::HeartbeatLoop;
use crate::liveness::LivenessTracker;
use crate::peer_queue::PeerQueues;
use crate::progress::{Heights, NodeProgress};
use crate::stats::{new_gossip_stats, GossipStat, GossipStats};
use crate::traits::{CommitteeSource, ConsensusCallback, Transport};
use crate::NetworkError;
use quorum_utils::lock;

pub struct NetService<T, C, B> {
    local: PeerAddress,
    config: GossipConfig,
    transport: Arc<T>,
    committee: Arc<C>,
    progress: Arc<NodeProgress>,
    cache: Arc<DedupCache>,
    liveness: Arc<LivenessTracker>,
    queues: Arc<PeerQueues<T>>,
    engine: GossipEngine<T, C, B>,
    stats: Arc<GossipStats>,
    running: Arc<AtomicBool>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl<T, C, B> NetService<T, C, B>
where
    T: Transport,
    C: CommitteeSource,
    B: ConsensusCallback,
{
    /// Build a stopped service for the node listening at `local`.
    pub fn new(
        local: PeerAddress,
        config: GossipConfig,
        transport: Arc<T>,
        committee: Arc<C>,
        callback: Arc<B>,
    ) -> Result<Self, NetworkError> {
        config.validate()?;

        let progress = Arc::new(NodeProgress::new());
        let cache = Arc::new(DedupCache::new());
        let stats = Arc::new(new_gossip_stats());
        let queues = Arc::new(PeerQueues::new(
            Arc::clone(&transport),
            Arc::clone(&progress),
            Arc::clone(&stats),
            &config,
        ));
        let engine = GossipEngine::new(
            Arc::clone(&queues),
            Arc::clone(&cache),
            Arc::clone(&progress),
            Arc::clone(&committee),
            callback,
            Arc::clone(&stats),
            config.fanout_percent,
        );

        Ok(Self {
            local,
            config,
            transport,
            committee,
            progress,
            cache,
            liveness: Arc::new(LivenessTracker::new()),
            queues,
            engine,
            stats,
            running: Arc::new(AtomicBool::new(false)),
            heartbeat: Mutex::new(None),
        })
    }

    /// Spawn the heartbeat loop. Calling it again while running does
    /// nothing; a stopped service cannot be restarted.
    pub fn start(&self) -> Result<(), NetworkError> {
        if self.queues.is_stopped() {
            return Err(NetworkError::Stopped);
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let heartbeat = HeartbeatLoop::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.committee),
            Arc::clone(&self.liveness),
            Arc::clone(&self.progress),
            Arc::clone(&self.stats),
            &self.config,
            Arc::clone(&self.running),
        );
        *lock(&self.heartbeat) = Some(tokio::spawn(heartbeat.run()));
        tracing::info!(local = %self.local, "gossip service started");
        Ok(())
    }

    /// Raise the stop flag. Workers and the heartbeat loop exit after their
    /// current unit of work; queued messages are abandoned.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.queues.stop_all();
        tracing::info!(local = %self.local, "gossip service stopping");
    }

    /// Stop and wait for every background task to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let heartbeat = lock(&self.heartbeat).take();
        if let Some(handle) = heartbeat {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "heartbeat loop terminated abnormally");
            }
        }
        self.queues.join_all().await;
        tracing::info!(local = %self.local, "gossip service stopped");
    }

    /// Decode and dispatch one encoded envelope received from `sender`.
    /// Undecodable input is counted and dropped.
    pub fn handle_frame(&self, sender: &PeerAddress, bytes: &[u8]) -> InboundOutcome {
        match Envelope::decode(bytes) {
            Ok(envelope) => self.handle_envelope(sender, envelope),
            Err(e) => {
                self.stats.increment(GossipStat::DecodeFailed);
                tracing::warn!(sender = %sender, len = bytes.len(), error = %e, "dropping undecodable message");
                InboundOutcome::Malformed
            }
        }
    }

    /// Dispatch one decoded envelope received from `sender`.
    ///
    /// A heartbeat is the sender's acknowledgment and stops here; anything
    /// else goes through the gossip engine.
    pub fn handle_envelope(&self, sender: &PeerAddress, envelope: Envelope) -> InboundOutcome {
        if envelope.message.is_heartbeat() {
            self.liveness.record_ack(sender, Instant::now());
            self.stats.increment(GossipStat::HeartbeatAck);
            tracing::trace!(sender = %sender, "heartbeat ack");
            return InboundOutcome::HeartbeatAck;
        }
        let identity = self.transport.resolve_identity(sender);
        tracing::debug!(
            sender = %identity,
            kind = envelope.message.kind(),
            gossip = envelope.is_gossip(),
            "inbound message"
        );
        self.engine.handle_inbound(&identity, envelope)
    }

    /// Gossip `message` to a random subset of the committee.
    pub fn broadcast(&self, message: Message) -> Result<BroadcastOutcome, NetworkError> {
        if self.queues.is_stopped() {
            return Err(NetworkError::Stopped);
        }
        self.engine.broadcast(message)
    }

    /// Queue `message` for `peer` alone, without the gossip flag. Sending to
    /// the local node is a no-op.
    pub fn send_to(&self, peer: &PeerAddress, message: Message) -> Result<(), NetworkError> {
        if peer == &self.local {
            return Ok(());
        }
        self.queues.enqueue(peer, Envelope::direct(message))
    }

    /// Record committed heights and prune dedup entries behind them.
    /// Returns the number of cache entries removed.
    pub fn on_block_committed(&self, block: u64, key_block: u64) -> usize {
        let current = self.progress.advance(block, key_block);
        let pruned = self.cache.prune_below(current);
        tracing::debug!(
            block = current.block,
            key_block = current.key_block,
            pruned,
            "progress advanced"
        );
        pruned
    }

    /// Drain the queue workers of peers that left the committee. Returns
    /// how many workers were asked to drain; zero when no committee is
    /// resolved.
    pub fn adjust_committee(&self) -> usize {
        let Some(committee) = self.committee.current_committee() else {
            tracing::warn!("committee unresolved, not adjusting queues");
            return 0;
        };
        let draining = self.queues.retain_only(&committee.addresses());
        if draining > 0 {
            tracing::info!(draining, members = committee.len(), "committee adjusted");
        }
        draining
    }

    /// Snapshot of the gossip event counters, keyed by stat name.
    pub fn stats(&self) -> HashMap<&'static str, u64> {
        self.stats
            .snapshot()
            .into_iter()
            .map(|(stat, count)| (stat.name(), count))
            .collect()
    }

    pub fn stat(&self, stat: GossipStat) -> u64 {
        self.stats.get(stat)
    }

    pub fn progress(&self) -> Heights {
        self.progress.current()
    }

    pub fn local(&self) -> &PeerAddress {
        &self.local
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn dedup_len(&self) -> usize {
        self.cache.len()
    }

    pub fn active_workers(&self) -> usize {
        self.queues.active_workers()
    }

    pub fn liveness(&self) -> &Arc<LivenessTracker> {
        &self.liveness
    }

    pub fn queues(&self) -> &PeerQueues<T> {
        &self.queues
    }
}
