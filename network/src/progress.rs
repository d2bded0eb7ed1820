//! Process-wide consensus position.

use std::sync::atomic::{AtomicU64, Ordering};

use quorum_messages::{Height, Message};

/// A pair of block / key block heights. Zero means "unset" when used as
/// dedup provenance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Heights {
    pub block: u64,
    pub key_block: u64,
}

impl Heights {
    pub fn new(block: u64, key_block: u64) -> Self {
        Self { block, key_block }
    }
}

impl From<Height> for Heights {
    fn from(height: Height) -> Self {
        match height {
            Height::Block(n) => Self::new(n, 0),
            Height::KeyBlock(k) => Self::new(0, k),
        }
    }
}

/// Provenance recorded for a message in the dedup cache.
pub fn provenance(message: &Message) -> Heights {
    message.height().map(Heights::from).unwrap_or_default()
}

/// Current block and key block heights of the local node.
///
/// Written by the commit notification path, read by everything else. Both
/// counters only move forward.
#[derive(Debug, Default)]
pub struct NodeProgress {
    block: AtomicU64,
    key_block: AtomicU64,
}

impl NodeProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to at least the given heights and return the new position.
    pub fn advance(&self, block: u64, key_block: u64) -> Heights {
        let prev_block = self.block.fetch_max(block, Ordering::AcqRel);
        let prev_key = self.key_block.fetch_max(key_block, Ordering::AcqRel);
        Heights::new(prev_block.max(block), prev_key.max(key_block))
    }

    pub fn current(&self) -> Heights {
        Heights::new(self.block_number(), self.key_block_number())
    }

    pub fn block_number(&self) -> u64 {
        self.block.load(Ordering::Acquire)
    }

    pub fn key_block_number(&self) -> u64 {
        self.key_block.load(Ordering::Acquire)
    }

    /// Whether `message` refers to a height the node has already moved past.
    pub fn is_stale(&self, message: &Message) -> bool {
        match message.height() {
            Some(Height::Block(n)) => n < self.block_number(),
            Some(Height::KeyBlock(k)) => k < self.key_block_number(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_messages::{BlockMsg, ConsensusMsg, HeaderMsg, HeartbeatMsg};

    fn consensus(key: u64) -> Message {
        Message::Consensus(ConsensusMsg {
            key_block_number: key,
            round: 0,
            payload: vec![],
        })
    }

    fn header(n: u64) -> Message {
        Message::Header(HeaderMsg {
            block_number: n,
            payload: vec![],
        })
    }

    #[test]
    fn advance_never_moves_backwards() {
        let progress = NodeProgress::new();
        assert_eq!(progress.advance(10, 2), Heights::new(10, 2));
        assert_eq!(progress.advance(8, 3), Heights::new(10, 3));
        assert_eq!(progress.current(), Heights::new(10, 3));
    }

    #[test]
    fn staleness_uses_the_variant_height() {
        let progress = NodeProgress::new();
        progress.advance(100, 5);

        assert!(progress.is_stale(&consensus(4)));
        assert!(!progress.is_stale(&consensus(5)));
        assert!(!progress.is_stale(&consensus(6)));

        let block = Message::Block(BlockMsg {
            key_block_number: 4,
            payload: vec![],
        });
        assert!(progress.is_stale(&block));

        assert!(progress.is_stale(&header(99)));
        assert!(!progress.is_stale(&header(100)));
    }

    #[test]
    fn heartbeats_never_go_stale() {
        let progress = NodeProgress::new();
        progress.advance(u64::MAX, u64::MAX);
        assert!(!progress.is_stale(&Message::Heartbeat(HeartbeatMsg { block_number: 0 })));
    }

    #[test]
    fn provenance_per_variant() {
        assert_eq!(provenance(&consensus(7)), Heights::new(0, 7));
        assert_eq!(provenance(&header(9)), Heights::new(9, 0));
        assert_eq!(
            provenance(&Message::Heartbeat(HeartbeatMsg { block_number: 9 })),
            Heights::default()
        );
    }
}
