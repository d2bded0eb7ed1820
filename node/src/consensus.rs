//! Stand-in consensus callback for a node without a state machine attached.

use std::sync::atomic::{AtomicU64, Ordering};

use quorum_messages::Message;
use quorum_network::ConsensusCallback;
use quorum_types::PeerIdentity;

/// Logs every delivered message and counts deliveries per variant.
#[derive(Default)]
pub struct LoggingConsensus {
    consensus: AtomicU64,
    blocks: AtomicU64,
    headers: AtomicU64,
}

impl LoggingConsensus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far.
    pub fn delivered(&self) -> u64 {
        self.consensus.load(Ordering::Relaxed)
            + self.blocks.load(Ordering::Relaxed)
            + self.headers.load(Ordering::Relaxed)
    }
}

impl ConsensusCallback for LoggingConsensus {
    fn on_message(&self, sender: &PeerIdentity, message: Message) {
        let counter = match &message {
            Message::Consensus(_) => &self.consensus,
            Message::Block(_) => &self.blocks,
            Message::Header(_) => &self.headers,
            // Heartbeats stop at the liveness tracker.
            Message::Heartbeat(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            sender = %sender,
            kind = message.kind(),
            height = ?message.height(),
            "consensus message"
        );
    }
}
