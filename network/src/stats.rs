//! Gossip event counters.

use quorum_utils::StatsCounter;

/// Events counted by the gossip layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GossipStat {
    /// Inbound messages handed to the consensus callback.
    Delivered,
    /// Gossip messages dropped because their digest was already cached.
    Duplicate,
    /// Messages dropped for referring to a height behind local progress.
    Stale,
    /// Envelopes enqueued for fan-out.
    Fanout,
    /// Envelopes a queue worker handed to the transport successfully.
    Sent,
    SendFailed,
    HeartbeatSent,
    HeartbeatAck,
    DecodeFailed,
}

impl GossipStat {
    pub const ALL: [GossipStat; 9] = [
        Self::Delivered,
        Self::Duplicate,
        Self::Stale,
        Self::Fanout,
        Self::Sent,
        Self::SendFailed,
        Self::HeartbeatSent,
        Self::HeartbeatAck,
        Self::DecodeFailed,
    ];

    /// Stable snake_case name, used as a metric suffix.
    pub fn name(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Duplicate => "duplicate",
            Self::Stale => "stale",
            Self::Fanout => "fanout",
            Self::Sent => "sent",
            Self::SendFailed => "send_failed",
            Self::HeartbeatSent => "heartbeat_sent",
            Self::HeartbeatAck => "heartbeat_ack",
            Self::DecodeFailed => "decode_failed",
        }
    }
}

pub type GossipStats = StatsCounter<GossipStat>;

pub fn new_gossip_stats() -> GossipStats {
    StatsCounter::new(&GossipStat::ALL)
}
