//! Collaborator seams: the transport below, the committee beside, and the
//! consensus state machine above the gossip layer.

use std::collections::HashSet;
use std::future::Future;

use quorum_messages::{Envelope, Message};
use quorum_types::{PeerAddress, PeerIdentity};

use crate::NetworkError;

/// Point-to-point delivery of a single envelope.
pub trait Transport: Send + Sync + 'static {
    /// Send one envelope to `peer`. Resolves once the transport has handed
    /// the bytes off (or failed to).
    fn send_direct(
        &self,
        peer: &PeerAddress,
        envelope: &Envelope,
    ) -> impl Future<Output = Result<(), NetworkError>> + Send;

    /// Sends to `peer` that have started but not yet completed.
    fn in_flight(&self, peer: &PeerAddress) -> usize;

    /// Identity to attribute traffic from `address` to.
    fn resolve_identity(&self, address: &PeerAddress) -> PeerIdentity {
        PeerIdentity::new(address.clone())
    }
}

/// One seat in the committee.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitteeMember {
    pub address: PeerAddress,
    /// Whether this seat is held by the local node.
    pub is_self: bool,
}

impl CommitteeMember {
    pub fn peer(address: impl Into<PeerAddress>) -> Self {
        Self {
            address: address.into(),
            is_self: false,
        }
    }

    pub fn local(address: impl Into<PeerAddress>) -> Self {
        Self {
            address: address.into(),
            is_self: true,
        }
    }
}

/// A snapshot of the committee for the current epoch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Committee {
    pub members: Vec<CommitteeMember>,
}

impl Committee {
    pub fn new(members: Vec<CommitteeMember>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members other than the local node.
    pub fn peers(&self) -> impl Iterator<Item = &CommitteeMember> {
        self.members.iter().filter(|m| !m.is_self)
    }

    pub fn contains(&self, address: &PeerAddress) -> bool {
        self.members.iter().any(|m| &m.address == address)
    }

    pub fn addresses(&self) -> HashSet<PeerAddress> {
        self.members.iter().map(|m| m.address.clone()).collect()
    }
}

/// Read-only view of committee membership.
pub trait CommitteeSource: Send + Sync + 'static {
    /// `None` while membership is unresolved (e.g. mid-reconfiguration).
    fn current_committee(&self) -> Option<Committee>;

    /// Seats in the current committee, the local node included.
    fn committee_size(&self) -> usize {
        self.current_committee().map(|c| c.len()).unwrap_or(0)
    }
}

/// Consumer of decoded consensus traffic.
pub trait ConsensusCallback: Send + Sync + 'static {
    /// Called once per non-duplicate, non-stale inbound message.
    fn on_message(&self, sender: &PeerIdentity, message: Message);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committee() -> Committee {
        Committee::new(vec![
            CommitteeMember::local("a:1"),
            CommitteeMember::peer("b:1"),
            CommitteeMember::peer("c:1"),
        ])
    }

    #[test]
    fn peers_excludes_self() {
        let c = committee();
        let peers: Vec<_> = c.peers().map(|m| m.address.as_str()).collect();
        assert_eq!(peers, vec!["b:1", "c:1"]);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn membership_queries() {
        let c = committee();
        assert!(c.contains(&PeerAddress::from("a:1")));
        assert!(!c.contains(&PeerAddress::from("z:1")));
        assert_eq!(c.addresses().len(), 3);
    }

    struct Fixed(Option<Committee>);

    impl CommitteeSource for Fixed {
        fn current_committee(&self) -> Option<Committee> {
            self.0.clone()
        }
    }

    #[test]
    fn default_committee_size_follows_snapshot() {
        assert_eq!(Fixed(Some(committee())).committee_size(), 3);
        assert_eq!(Fixed(None).committee_size(), 0);
    }
}
