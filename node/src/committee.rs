//! Committee membership from configuration.

use std::sync::RwLock;

use quorum_network::{Committee, CommitteeMember, CommitteeSource};
use quorum_types::PeerAddress;

/// Committee source backed by a fixed address list that can be replaced
/// wholesale on reconfiguration.
pub struct StaticCommittee {
    local: PeerAddress,
    current: RwLock<Committee>,
}

impl StaticCommittee {
    /// `local` plus `members`; `local` is added if missing and always
    /// flagged as self. Duplicates are collapsed.
    pub fn new(local: PeerAddress, members: &[String]) -> Self {
        let committee = build(&local, members);
        Self {
            local,
            current: RwLock::new(committee),
        }
    }

    /// Swap in a new member list.
    pub fn replace(&self, members: &[String]) {
        let committee = build(&self.local, members);
        tracing::info!(members = committee.len(), "committee replaced");
        let mut current = self
            .current
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *current = committee;
    }
}

fn build(local: &PeerAddress, members: &[String]) -> Committee {
    let mut all = vec![CommitteeMember::local(local.clone())];
    for m in members {
        let address = PeerAddress::from(m.as_str());
        if all.iter().any(|existing| existing.address == address) {
            continue;
        }
        all.push(CommitteeMember::peer(address));
    }
    Committee::new(all)
}

impl CommitteeSource for StaticCommittee {
    fn current_committee(&self) -> Option<Committee> {
        let current = self
            .current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Some(current.clone())
    }
}
