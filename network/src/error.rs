use quorum_messages::MessageError;
use quorum_types::PeerAddress;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("send to {peer} failed: {reason}")]
    SendFailed { peer: PeerAddress, reason: String },

    #[error("peer {0} unreachable")]
    Unreachable(PeerAddress),

    #[error("no current committee")]
    NoCommittee,

    #[error("message codec error: {0}")]
    Message(#[from] MessageError),

    #[error("gossip service is stopped")]
    Stopped,

    #[error("invalid gossip config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for NetworkError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
