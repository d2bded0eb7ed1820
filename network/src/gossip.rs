//! Staleness, novelty and fan-out decisions for consensus traffic.

use std::sync::Arc;

use quorum_messages::{Envelope, Message};
use quorum_types::{PeerAddress, PeerIdentity};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::fanout_size;
use crate::dedup::DedupCache;
use crate::peer_queue::PeerQueues;
use crate::progress::{provenance, NodeProgress};
use crate::stats::{GossipStat, GossipStats};
use crate::traits::{Committee, CommitteeSource, ConsensusCallback, Transport};
use crate::NetworkError;

/// What happened to an inbound envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Referred to a height behind local progress; dropped.
    Stale,
    /// Gossip whose digest was already cached; dropped.
    Duplicate,
    /// Handed to consensus after re-broadcasting to `fanout` peers.
    Delivered { fanout: usize },
    /// A heartbeat, recorded as the sender's acknowledgment.
    HeartbeatAck,
    /// Could not be decoded or digested; dropped.
    Malformed,
}

/// Result of a locally originated broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Enqueued for each of `targets`.
    Sent { targets: Vec<PeerAddress> },
    /// Already broadcast (or received) at this height; nothing sent.
    Duplicate,
    /// Behind local progress; nothing sent.
    Stale,
}

/// Pick up to `count` distinct non-self committee members uniformly at
/// random.
pub fn select_targets<R: Rng + ?Sized>(
    committee: &Committee,
    count: usize,
    rng: &mut R,
) -> Vec<PeerAddress> {
    let eligible: Vec<&PeerAddress> = committee.peers().map(|m| &m.address).collect();
    eligible
        .choose_multiple(rng, count)
        .map(|addr| (*addr).clone())
        .collect()
}

pub struct GossipEngine<T, C, B> {
    queues: Arc<PeerQueues<T>>,
    cache: Arc<DedupCache>,
    progress: Arc<NodeProgress>,
    committee: Arc<C>,
    callback: Arc<B>,
    stats: Arc<GossipStats>,
    fanout_percent: u32,
}

impl<T, C, B> GossipEngine<T, C, B>
where
    T: Transport,
    C: CommitteeSource,
    B: ConsensusCallback,
{
    pub fn new(
        queues: Arc<PeerQueues<T>>,
        cache: Arc<DedupCache>,
        progress: Arc<NodeProgress>,
        committee: Arc<C>,
        callback: Arc<B>,
        stats: Arc<GossipStats>,
        fanout_percent: u32,
    ) -> Self {
        Self {
            queues,
            cache,
            progress,
            committee,
            callback,
            stats,
            fanout_percent,
        }
    }

    /// Process one non-heartbeat envelope from `sender`.
    ///
    /// Stale messages are dropped. Gossip-flagged messages are recorded in
    /// the dedup cache and re-broadcast the first time they are seen, and
    /// dropped every time after. Without a committee they are delivered but
    /// neither recorded nor relayed. Everything that survives reaches the
    /// consensus callback exactly once per receipt.
    pub fn handle_inbound(&self, sender: &PeerIdentity, envelope: Envelope) -> InboundOutcome {
        if self.progress.is_stale(&envelope.message) {
            self.stats.increment(GossipStat::Stale);
            tracing::trace!(
                sender = %sender,
                kind = envelope.message.kind(),
                "dropping stale message"
            );
            return InboundOutcome::Stale;
        }

        let mut fanout = 0;
        if envelope.is_gossip() {
            let digest = match envelope.digest() {
                Ok(d) => d,
                Err(e) => {
                    self.stats.increment(GossipStat::DecodeFailed);
                    tracing::warn!(sender = %sender, error = %e, "couldn't digest gossip message");
                    return InboundOutcome::Malformed;
                }
            };
            match self.committee.current_committee() {
                Some(committee) => {
                    if !self.cache.record(digest, provenance(&envelope.message)) {
                        self.stats.increment(GossipStat::Duplicate);
                        tracing::trace!(sender = %sender, digest = ?digest, "duplicate gossip");
                        return InboundOutcome::Duplicate;
                    }
                    fanout = match self.enqueue_to(&committee, &envelope) {
                        Ok(targets) => targets.len(),
                        Err(e) => {
                            tracing::warn!(digest = ?digest, error = %e, "gossip not relayed");
                            0
                        }
                    };
                }
                // Left unrecorded so a later copy is relayed once the committee resolves.
                None => {
                    tracing::debug!(digest = ?digest, "no committee, gossip not relayed");
                }
            }
        }

        let kind = envelope.message.kind();
        self.callback.on_message(sender, envelope.message);
        self.stats.increment(GossipStat::Delivered);
        tracing::trace!(sender = %sender, kind, fanout, "delivered");
        InboundOutcome::Delivered { fanout }
    }

    /// Originate a gossip broadcast of `message`.
    ///
    /// The committee is resolved before the digest is recorded, so a
    /// broadcast skipped for lack of a committee can be retried.
    pub fn broadcast(&self, message: Message) -> Result<BroadcastOutcome, NetworkError> {
        if self.progress.is_stale(&message) {
            self.stats.increment(GossipStat::Stale);
            return Ok(BroadcastOutcome::Stale);
        }
        let committee = self
            .committee
            .current_committee()
            .ok_or(NetworkError::NoCommittee)?;

        let envelope = Envelope::gossip(message);
        let digest = envelope.digest()?;
        if !self.cache.record(digest, provenance(&envelope.message)) {
            self.stats.increment(GossipStat::Duplicate);
            tracing::debug!(digest = ?digest, "broadcast suppressed, already seen");
            return Ok(BroadcastOutcome::Duplicate);
        }

        let targets = self.enqueue_to(&committee, &envelope)?;
        tracing::debug!(
            digest = ?digest,
            kind = envelope.message.kind(),
            targets = targets.len(),
            "broadcast"
        );
        Ok(BroadcastOutcome::Sent { targets })
    }

    fn enqueue_to(
        &self,
        committee: &Committee,
        envelope: &Envelope,
    ) -> Result<Vec<PeerAddress>, NetworkError> {
        let count = fanout_size(committee.len(), self.fanout_percent);
        let targets = select_targets(committee, count, &mut rand::thread_rng());
        for peer in &targets {
            self.queues.enqueue(peer, envelope.clone())?;
            self.stats.increment(GossipStat::Fanout);
        }
        Ok(targets)
    }
}
