//! Message types exchanged between committee members.
//!
//! Every frame on the wire is an [`Envelope`]: a [`Message`] plus a flag byte
//! saying whether the receiver should re-broadcast it. Consensus-bearing
//! variants expose their position in the chain through [`Message::height`],
//! which the gossip layer compares against local progress to discard stale
//! traffic.

use quorum_types::MessageDigest;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to encode message: {0}")]
    Encode(String),

    #[error("failed to decode message: {0}")]
    Decode(String),
}

/// A consensus round message (proposal, prepare, commit vote...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusMsg {
    /// Key block (epoch) this round belongs to.
    pub key_block_number: u64,
    pub round: u64,
    pub payload: Vec<u8>,
}

/// A key block proposal or commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMsg {
    pub key_block_number: u64,
    pub payload: Vec<u8>,
}

/// A transaction block header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMsg {
    pub block_number: u64,
    pub payload: Vec<u8>,
}

/// Liveness probe; its receipt counts as an acknowledgment from the sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMsg {
    /// Sender's current block height.
    pub block_number: u64,
}

/// All messages carried by the gossip layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Consensus(ConsensusMsg),
    Block(BlockMsg),
    Header(HeaderMsg),
    Heartbeat(HeartbeatMsg),
}

/// Chain position a message refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Height {
    /// Compared against the current transaction block height.
    Block(u64),
    /// Compared against the current key block height.
    KeyBlock(u64),
}

impl Message {
    /// The height used for staleness checks. Heartbeats never go stale.
    pub fn height(&self) -> Option<Height> {
        match self {
            Self::Consensus(m) => Some(Height::KeyBlock(m.key_block_number)),
            Self::Block(m) => Some(Height::KeyBlock(m.key_block_number)),
            Self::Header(m) => Some(Height::Block(m.block_number)),
            Self::Heartbeat(_) => None,
        }
    }

    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Consensus(_) => "consensus",
            Self::Block(_) => "block",
            Self::Header(_) => "header",
            Self::Heartbeat(_) => "heartbeat",
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Heartbeat(_))
    }

    /// Canonical encoding. Identical content always yields identical bytes.
    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        bincode::serialize(self).map_err(|e| MessageError::Encode(e.to_string()))
    }

    /// Digest over the canonical encoding; the gossip dedup key.
    pub fn digest(&self) -> Result<MessageDigest, MessageError> {
        Ok(quorum_crypto::digest_bytes(&self.encode()?))
    }
}

/// Per-envelope flag bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFlags(u8);

impl MessageFlags {
    /// Receiver should re-broadcast to a random subset of the committee.
    pub const GOSSIP: u8 = 0x08;

    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_gossip(&self) -> bool {
        self.0 & Self::GOSSIP != 0
    }
}

/// What actually travels between peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub flags: MessageFlags,
    pub message: Message,
}

impl Envelope {
    /// Wrap a message for epidemic re-broadcast.
    pub fn gossip(message: Message) -> Self {
        Self {
            flags: MessageFlags::new(MessageFlags::GOSSIP),
            message,
        }
    }

    /// Wrap a message for point-to-point delivery only.
    pub fn direct(message: Message) -> Self {
        Self {
            flags: MessageFlags::default(),
            message,
        }
    }

    pub fn is_gossip(&self) -> bool {
        self.flags.is_gossip()
    }

    /// Digest of the carried message. Flags are excluded so that the same
    /// content hashes identically however it was wrapped.
    pub fn digest(&self) -> Result<MessageDigest, MessageError> {
        self.message.digest()
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        bincode::serialize(self).map_err(|e| MessageError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        bincode::deserialize(bytes).map_err(|e| MessageError::Decode(e.to_string()))
    }
}
