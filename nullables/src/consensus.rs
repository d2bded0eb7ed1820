//! Nullable consensus callback: record deliveries.

use std::sync::Mutex;

use quorum_messages::Message;
use quorum_network::ConsensusCallback;
use quorum_types::PeerIdentity;

use quorum_utils::lock;

#[derive(Default)]
pub struct NullConsensus {
    delivered: Mutex<Vec<(PeerIdentity, Message)>>,
}

impl NullConsensus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message handed to consensus, in delivery order.
    pub fn delivered(&self) -> Vec<(PeerIdentity, Message)> {
        lock(&self.delivered).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.delivered).len()
    }

    pub fn clear(&self) {
        lock(&self.delivered).clear();
    }
}

impl ConsensusCallback for NullConsensus {
    fn on_message(&self, sender: &PeerIdentity, message: Message) {
        lock(&self.delivered).push((sender.clone(), message));
    }
}
