//! Per-peer acknowledgment tracking for the heartbeat loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quorum_types::PeerAddress;
use tokio::time::Instant;

use quorum_utils::lock;

#[derive(Default)]
struct LivenessRecord {
    last_ack: Mutex<Option<Instant>>,
    heartbeat_in_flight: AtomicBool,
}

/// Last acknowledgment time and heartbeat in-flight flag for every peer
/// ever referenced. Records are created lazily and live as long as the
/// tracker, so they carry over across committee changes.
#[derive(Default)]
pub struct LivenessTracker {
    records: Mutex<HashMap<PeerAddress, Arc<LivenessRecord>>>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, peer: &PeerAddress) -> Arc<LivenessRecord> {
        let mut records = lock(&self.records);
        Arc::clone(records.entry(peer.clone()).or_default())
    }

    fn existing(&self, peer: &PeerAddress) -> Option<Arc<LivenessRecord>> {
        lock(&self.records).get(peer).cloned()
    }

    /// Note an acknowledgment from `peer` at `now`.
    pub fn record_ack(&self, peer: &PeerAddress, now: Instant) {
        let record = self.record(peer);
        *lock(&record.last_ack) = Some(now);
    }

    pub fn last_ack(&self, peer: &PeerAddress) -> Option<Instant> {
        self.existing(peer).and_then(|r| *lock(&r.last_ack))
    }

    /// `now - last_ack > timeout`. A peer that never acknowledged is overdue.
    pub fn is_overdue(&self, peer: &PeerAddress, timeout: Duration, now: Instant) -> bool {
        match self.last_ack(peer) {
            Some(last) => now.saturating_duration_since(last) > timeout,
            None => true,
        }
    }

    /// Claim the heartbeat slot for `peer`. Returns `None` while another
    /// heartbeat to the same peer is still in flight; the slot is released
    /// when the returned guard is dropped.
    pub fn try_begin_heartbeat(&self, peer: &PeerAddress) -> Option<HeartbeatGuard> {
        let record = self.record(peer);
        record
            .heartbeat_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| HeartbeatGuard { record })
    }

    pub fn heartbeat_in_flight(&self, peer: &PeerAddress) -> bool {
        self.existing(peer)
            .map(|r| r.heartbeat_in_flight.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Number of peers with a record.
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }
}

/// Holds a peer's heartbeat in-flight flag; clears it on drop.
pub struct HeartbeatGuard {
    record: Arc<LivenessRecord>,
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.record
            .heartbeat_in_flight
            .store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(s: &str) -> PeerAddress {
        PeerAddress::from(s)
    }

    #[test]
    fn unknown_peer_is_overdue() {
        let tracker = LivenessTracker::new();
        assert!(tracker.is_overdue(&peer("a:1"), Duration::from_secs(3600), Instant::now()));
        assert_eq!(tracker.last_ack(&peer("a:1")), None);
    }

    #[test]
    fn overdue_only_strictly_after_timeout() {
        let tracker = LivenessTracker::new();
        let t0 = Instant::now();
        let timeout = Duration::from_secs(1);
        tracker.record_ack(&peer("a:1"), t0);

        assert!(!tracker.is_overdue(&peer("a:1"), timeout, t0 + Duration::from_millis(500)));
        assert!(!tracker.is_overdue(&peer("a:1"), timeout, t0 + timeout));
        assert!(tracker.is_overdue(&peer("a:1"), timeout, t0 + Duration::from_millis(1500)));
    }

    #[test]
    fn ack_resets_the_clock() {
        let tracker = LivenessTracker::new();
        let t0 = Instant::now();
        let timeout = Duration::from_secs(1);
        tracker.record_ack(&peer("a:1"), t0);
        tracker.record_ack(&peer("a:1"), t0 + Duration::from_secs(2));
        assert!(!tracker.is_overdue(&peer("a:1"), timeout, t0 + Duration::from_millis(2500)));
        assert_eq!(tracker.last_ack(&peer("a:1")), Some(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn clock_going_backwards_is_not_overdue() {
        let tracker = LivenessTracker::new();
        let t0 = Instant::now();
        tracker.record_ack(&peer("a:1"), t0 + Duration::from_secs(5));
        assert!(!tracker.is_overdue(&peer("a:1"), Duration::from_secs(1), t0));
    }

    #[test]
    fn heartbeat_slot_is_exclusive_until_guard_drops() {
        let tracker = LivenessTracker::new();
        let guard = tracker.try_begin_heartbeat(&peer("a:1")).expect("first claim");
        assert!(tracker.heartbeat_in_flight(&peer("a:1")));
        assert!(tracker.try_begin_heartbeat(&peer("a:1")).is_none());

        // Other peers are independent.
        assert!(tracker.try_begin_heartbeat(&peer("b:1")).is_some());

        drop(guard);
        assert!(!tracker.heartbeat_in_flight(&peer("a:1")));
        assert!(tracker.try_begin_heartbeat(&peer("a:1")).is_some());
    }

    #[test]
    fn records_are_created_lazily() {
        let tracker = LivenessTracker::new();
        assert!(tracker.is_empty());
        tracker.is_overdue(&peer("a:1"), Duration::from_secs(1), Instant::now());
        assert_eq!(tracker.len(), 0);
        tracker.record_ack(&peer("a:1"), Instant::now());
        assert_eq!(tracker.len(), 1);
    }
}
