//! Nullable transport: record envelopes without sending them.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use quorum_messages::{Envelope, Message};
use quorum_network::{NetworkError, Transport};
use quorum_types::PeerAddress;

use quorum_utils::lock;

/// A transport that records every envelope instead of sending it.
///
/// Sends can be slowed down (`set_send_delay`), made to fail per peer
/// (`fail_sends_to`), and a baseline in-flight count can be reported per
/// peer (`set_in_flight`) to simulate a saturated link.
#[derive(Default)]
pub struct NullTransport {
    sent: Mutex<Vec<(PeerAddress, Envelope)>>,
    baseline_in_flight: Mutex<HashMap<PeerAddress, usize>>,
    active: Mutex<HashMap<PeerAddress, usize>>,
    peak_active: Mutex<HashMap<PeerAddress, usize>>,
    send_delay: Mutex<Duration>,
    failing: Mutex<HashSet<PeerAddress>>,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every successful send so far, in completion order.
    pub fn sent(&self) -> Vec<(PeerAddress, Envelope)> {
        lock(&self.sent).clone()
    }

    /// Envelopes delivered to `peer`, in completion order.
    pub fn sent_to(&self, peer: &PeerAddress) -> Vec<Envelope> {
        lock(&self.sent)
            .iter()
            .filter(|(p, _)| p == peer)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.sent).len()
    }

    /// Distinct peers that received at least one envelope.
    pub fn recipients(&self) -> HashSet<PeerAddress> {
        lock(&self.sent).iter().map(|(p, _)| p.clone()).collect()
    }

    /// Heartbeats delivered to `peer`.
    pub fn heartbeats_to(&self, peer: &PeerAddress) -> usize {
        lock(&self.sent)
            .iter()
            .filter(|(p, e)| p == peer && matches!(e.message, Message::Heartbeat(_)))
            .count()
    }

    /// Highest number of concurrent sends ever observed to `peer`.
    pub fn peak_concurrency(&self, peer: &PeerAddress) -> usize {
        lock(&self.peak_active).get(peer).copied().unwrap_or(0)
    }

    /// Report `count` extra in-flight sends to `peer`.
    pub fn set_in_flight(&self, peer: &PeerAddress, count: usize) {
        lock(&self.baseline_in_flight).insert(peer.clone(), count);
    }

    /// Make every send take `delay` before it completes.
    pub fn set_send_delay(&self, delay: Duration) {
        *lock(&self.send_delay) = delay;
    }

    /// Fail every send to `peer` until `clear_failures`.
    pub fn fail_sends_to(&self, peer: &PeerAddress) {
        lock(&self.failing).insert(peer.clone());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    /// Forget recorded sends.
    pub fn reset(&self) {
        lock(&self.sent).clear();
    }

    fn begin(&self, peer: &PeerAddress) {
        let mut active = lock(&self.active);
        let now = active.entry(peer.clone()).or_default();
        *now += 1;
        let mut peak = lock(&self.peak_active);
        let max = peak.entry(peer.clone()).or_default();
        *max = (*max).max(*now);
    }

    fn finish(&self, peer: &PeerAddress) {
        if let Some(n) = lock(&self.active).get_mut(peer) {
            *n = n.saturating_sub(1);
        }
    }
}

impl Transport for NullTransport {
    async fn send_direct(&self, peer: &PeerAddress, envelope: &Envelope) -> Result<(), NetworkError> {
        self.begin(peer);
        let delay = *lock(&self.send_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.finish(peer);

        if lock(&self.failing).contains(peer) {
            return Err(NetworkError::SendFailed {
                peer: peer.clone(),
                reason: "null transport configured to fail".into(),
            });
        }
        lock(&self.sent).push((peer.clone(), envelope.clone()));
        Ok(())
    }

    fn in_flight(&self, peer: &PeerAddress) -> usize {
        let baseline = lock(&self.baseline_in_flight).get(peer).copied().unwrap_or(0);
        let active = lock(&self.active).get(peer).copied().unwrap_or(0);
        baseline + active
    }
}
