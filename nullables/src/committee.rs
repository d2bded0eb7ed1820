//! Nullable committee source with settable membership.

use std::sync::Mutex;

use quorum_network::{Committee, CommitteeMember, CommitteeSource};

use quorum_utils::lock;

/// A committee source whose snapshot is set by the test.
#[derive(Default)]
pub struct NullCommittee {
    current: Mutex<Option<Committee>>,
}

impl NullCommittee {
    pub fn new(committee: Committee) -> Self {
        Self {
            current: Mutex::new(Some(committee)),
        }
    }

    /// A source with no resolved committee.
    pub fn unresolved() -> Self {
        Self::default()
    }

    /// `local` plus `peers`, `local` flagged as self.
    pub fn with_members(local: &str, peers: &[&str]) -> Self {
        Self::new(Self::committee(local, peers))
    }

    pub fn committee(local: &str, peers: &[&str]) -> Committee {
        let mut members = vec![CommitteeMember::local(local)];
        members.extend(peers.iter().map(|p| CommitteeMember::peer(*p)));
        Committee::new(members)
    }

    pub fn set(&self, committee: Option<Committee>) {
        *lock(&self.current) = committee;
    }
}

impl CommitteeSource for NullCommittee {
    fn current_committee(&self) -> Option<Committee> {
        lock(&self.current).clone()
    }
}
