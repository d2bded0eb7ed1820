//! Peer-broadcast layer of a committee-based BFT node.
//!
//! Propagates consensus traffic among the current committee members,
//! suppresses re-delivery of messages that were already seen, and tracks
//! peer liveness to drive heartbeat retransmission.
//!
//! The pieces are independently synchronized and wired together by
//! [`NetService`]:
//! - [`DedupCache`]: digest → provenance heights, pruned on every commit.
//! - [`PeerQueues`]: one FIFO and at most one draining worker per peer.
//! - [`LivenessTracker`]: last acknowledgment time and heartbeat in-flight flag.
//! - [`GossipEngine`]: staleness, novelty and random fan-out decisions.
//! - [`HeartbeatLoop`]: periodic scan for overdue peers.

pub mod config;
pub mod dedup;
pub mod error;
pub mod gossip;
pub mod heartbeat;
pub mod liveness;
pub mod peer_queue;
pub mod progress;
pub mod service;
pub mod stats;
pub mod traits;

pub use config::GossipConfig;
pub use dedup::DedupCache;
pub use error::NetworkError;
pub use gossip::{select_targets, BroadcastOutcome, GossipEngine, InboundOutcome};
pub use heartbeat::HeartbeatLoop;
pub use liveness::{HeartbeatGuard, LivenessTracker};
pub use peer_queue::{PeerQueues, WorkerState};
pub use progress::{Heights, NodeProgress};
pub use service::NetService;
pub use stats::{GossipStat, GossipStats};
pub use traits::{Committee, CommitteeMember, CommitteeSource, ConsensusCallback, Transport};

