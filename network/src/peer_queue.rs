//! Per-peer outbound queues.
//!
//! Every peer gets an unbounded FIFO and at most one worker task draining
//! it. Enqueueing never blocks and never drops; back-pressure comes from
//! the transport's in-flight count, which the worker checks before each
//! send. Messages are re-checked for staleness when they reach the head of
//! the queue, since progress may have moved on while they waited.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quorum_messages::Envelope;
use quorum_types::PeerAddress;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::GossipConfig;
use crate::progress::NodeProgress;
use crate::stats::{GossipStat, GossipStats};
use crate::traits::Transport;
use crate::NetworkError;
use quorum_utils::lock;

/// Lifecycle of a peer's queue worker.
///
/// `Idle → Active` happens only on enqueue and only when no worker runs.
/// `Active → Draining` is requested from outside (the peer left the
/// committee); the worker empties the queue and settles back to `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Active,
    Draining,
}

impl WorkerState {
    const IDLE: u8 = 0;
    const ACTIVE: u8 = 1;
    const DRAINING: u8 = 2;

    fn from_raw(raw: u8) -> Self {
        match raw {
            Self::ACTIVE => Self::Active,
            Self::DRAINING => Self::Draining,
            _ => Self::Idle,
        }
    }
}

struct PeerQueue {
    address: PeerAddress,
    state: AtomicU8,
    pending: Mutex<VecDeque<Envelope>>,
    wake: Notify,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PeerQueue {
    fn new(address: PeerAddress) -> Self {
        Self {
            address,
            state: AtomicU8::new(WorkerState::IDLE),
            pending: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            worker: Mutex::new(None),
        }
    }

    fn state(&self) -> WorkerState {
        WorkerState::from_raw(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn push(&self, envelope: Envelope) {
        lock(&self.pending).push_back(envelope);
    }

    fn pop(&self) -> Option<Envelope> {
        lock(&self.pending).pop_front()
    }

    fn len(&self) -> usize {
        lock(&self.pending).len()
    }
}

/// Everything a worker needs besides its own queue.
struct WorkerContext<T> {
    transport: Arc<T>,
    progress: Arc<NodeProgress>,
    stats: Arc<GossipStats>,
    stopped: Arc<AtomicBool>,
    poll_interval: Duration,
    max_in_flight: usize,
}

impl<T> Clone for WorkerContext<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            progress: Arc::clone(&self.progress),
            stats: Arc::clone(&self.stats),
            stopped: Arc::clone(&self.stopped),
            poll_interval: self.poll_interval,
            max_in_flight: self.max_in_flight,
        }
    }
}

/// Registry of per-peer queues and their workers.
///
/// Workers are spawned onto the ambient tokio runtime, so [`enqueue`]
/// must be called from within one.
///
/// [`enqueue`]: PeerQueues::enqueue
pub struct PeerQueues<T> {
    queues: Mutex<HashMap<PeerAddress, Arc<PeerQueue>>>,
    ctx: WorkerContext<T>,
}

impl<T: Transport> PeerQueues<T> {
    pub fn new(
        transport: Arc<T>,
        progress: Arc<NodeProgress>,
        stats: Arc<GossipStats>,
        config: &GossipConfig,
    ) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            ctx: WorkerContext {
                transport,
                progress,
                stats,
                stopped: Arc::new(AtomicBool::new(false)),
                poll_interval: config.queue_poll_interval(),
                max_in_flight: config.max_in_flight_per_peer,
            },
        }
    }

    fn queue(&self, peer: &PeerAddress) -> Arc<PeerQueue> {
        let mut queues = lock(&self.queues);
        Arc::clone(
            queues
                .entry(peer.clone())
                .or_insert_with(|| Arc::new(PeerQueue::new(peer.clone()))),
        )
    }

    fn existing(&self, peer: &PeerAddress) -> Option<Arc<PeerQueue>> {
        lock(&self.queues).get(peer).cloned()
    }

    /// Append `envelope` to `peer`'s queue and make sure a worker drains it.
    pub fn enqueue(&self, peer: &PeerAddress, envelope: Envelope) -> Result<(), NetworkError> {
        if self.is_stopped() {
            return Err(NetworkError::Stopped);
        }
        let queue = self.queue(peer);
        queue.push(envelope);
        queue.wake.notify_one();
        if queue.transition(WorkerState::IDLE, WorkerState::ACTIVE) {
            self.spawn_worker(queue);
        }
        Ok(())
    }

    fn spawn_worker(&self, queue: Arc<PeerQueue>) {
        tracing::debug!(peer = %queue.address, "starting queue worker");
        let handle = tokio::spawn(run_worker(self.ctx.clone(), Arc::clone(&queue)));
        *lock(&queue.worker) = Some(handle);
    }

    /// Ask `peer`'s worker to drain and exit. Returns `false` if no worker
    /// was active.
    pub fn deactivate(&self, peer: &PeerAddress) -> bool {
        let Some(queue) = self.existing(peer) else {
            return false;
        };
        let moved = queue.transition(WorkerState::ACTIVE, WorkerState::DRAINING);
        if moved {
            tracing::debug!(peer = %peer, pending = queue.len(), "draining queue worker");
            queue.wake.notify_one();
        }
        moved
    }

    /// Deactivate every worker whose peer is not in `keep`. Returns how
    /// many were moved to draining.
    pub fn retain_only(&self, keep: &HashSet<PeerAddress>) -> usize {
        let departed: Vec<PeerAddress> = lock(&self.queues)
            .keys()
            .filter(|addr| !keep.contains(*addr))
            .cloned()
            .collect();
        departed.iter().filter(|addr| self.deactivate(addr)).count()
    }

    /// Refuse further enqueues and wake every worker so it can exit.
    pub fn stop_all(&self) {
        self.ctx.stopped.store(true, Ordering::Release);
        for queue in lock(&self.queues).values() {
            queue.wake.notify_one();
        }
    }

    /// Wait for every spawned worker to finish.
    pub async fn join_all(&self) {
        let handles: Vec<(PeerAddress, JoinHandle<()>)> = lock(&self.queues)
            .values()
            .filter_map(|q| lock(&q.worker).take().map(|h| (q.address.clone(), h)))
            .collect();
        for (peer, handle) in handles {
            if let Err(e) = handle.await {
                tracing::warn!(peer = %peer, error = %e, "queue worker terminated abnormally");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.ctx.stopped.load(Ordering::Acquire)
    }

    pub fn state(&self, peer: &PeerAddress) -> WorkerState {
        self.existing(peer)
            .map(|q| q.state())
            .unwrap_or(WorkerState::Idle)
    }

    pub fn pending_len(&self, peer: &PeerAddress) -> usize {
        self.existing(peer).map(|q| q.len()).unwrap_or(0)
    }

    /// Workers currently active or draining.
    pub fn active_workers(&self) -> usize {
        lock(&self.queues)
            .values()
            .filter(|q| q.state() != WorkerState::Idle)
            .count()
    }
}

/// Puts the queue back to `Idle` if the worker exits any way other than
/// the drained path (stop request, panic, abort).
struct ResetOnExit<'a> {
    queue: &'a PeerQueue,
    armed: bool,
}

impl ResetOnExit<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ResetOnExit<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.queue
                .state
                .store(WorkerState::IDLE, Ordering::Release);
        }
    }
}

async fn run_worker<T: Transport>(ctx: WorkerContext<T>, queue: Arc<PeerQueue>) {
    let mut reset = ResetOnExit {
        queue: &queue,
        armed: true,
    };

    loop {
        if ctx.stopped.load(Ordering::Acquire) {
            tracing::debug!(peer = %queue.address, pending = queue.len(), "queue worker stopped");
            return;
        }

        if ctx.transport.in_flight(&queue.address) > ctx.max_in_flight {
            tokio::time::sleep(ctx.poll_interval).await;
            continue;
        }

        if let Some(envelope) = queue.pop() {
            deliver(&ctx, &queue.address, envelope).await;
            continue;
        }

        if queue.state() == WorkerState::Draining {
            if queue.transition(WorkerState::DRAINING, WorkerState::IDLE) {
                // An enqueue may have landed between the empty pop and the
                // transition; whoever wins Idle → Active owns the queue.
                if queue.len() > 0 && queue.transition(WorkerState::IDLE, WorkerState::ACTIVE) {
                    continue;
                }
                reset.disarm();
                tracing::debug!(peer = %queue.address, "queue worker drained");
                return;
            }
            continue;
        }

        tokio::select! {
            _ = queue.wake.notified() => {}
            _ = tokio::time::sleep(ctx.poll_interval) => {}
        }
    }
}

async fn deliver<T: Transport>(ctx: &WorkerContext<T>, peer: &PeerAddress, envelope: Envelope) {
    if ctx.progress.is_stale(&envelope.message) {
        ctx.stats.increment(GossipStat::Stale);
        tracing::trace!(peer = %peer, kind = envelope.message.kind(), "dropping stale queued message");
        return;
    }
    match ctx.transport.send_direct(peer, &envelope).await {
        Ok(()) => ctx.stats.increment(GossipStat::Sent),
        Err(e) => {
            ctx.stats.increment(GossipStat::SendFailed);
            tracing::warn!(peer = %peer, error = %e, "couldn't send queued message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_state_decoding() {
        assert_eq!(WorkerState::from_raw(WorkerState::IDLE), WorkerState::Idle);
        assert_eq!(WorkerState::from_raw(WorkerState::ACTIVE), WorkerState::Active);
        assert_eq!(WorkerState::from_raw(WorkerState::DRAINING), WorkerState::Draining);
    }

    #[test]
    fn only_one_idle_to_active_transition_wins() {
        let queue = PeerQueue::new(PeerAddress::from("a:1"));
        assert!(queue.transition(WorkerState::IDLE, WorkerState::ACTIVE));
        assert!(!queue.transition(WorkerState::IDLE, WorkerState::ACTIVE));
        assert_eq!(queue.state(), WorkerState::Active);
    }

    #[test]
    fn reset_guard_restores_idle_unless_disarmed() {
        let queue = PeerQueue::new(PeerAddress::from("a:1"));
        queue.transition(WorkerState::IDLE, WorkerState::ACTIVE);
        drop(ResetOnExit {
            queue: &queue,
            armed: true,
        });
        assert_eq!(queue.state(), WorkerState::Idle);

        queue.transition(WorkerState::IDLE, WorkerState::ACTIVE);
        let mut guard = ResetOnExit {
            queue: &queue,
            armed: true,
        };
        guard.disarm();
        drop(guard);
        assert_eq!(queue.state(), WorkerState::Active);
    }

    #[test]
    fn fifo_order_within_a_queue() {
        use quorum_messages::{HeartbeatMsg, Message};
        let queue = PeerQueue::new(PeerAddress::from("a:1"));
        for n in 0..3 {
            queue.push(Envelope::direct(Message::Heartbeat(HeartbeatMsg { block_number: n })));
        }
        let order: Vec<u64> = std::iter::from_fn(|| queue.pop())
            .map(|e| match e.message {
                Message::Heartbeat(hb) => hb.block_number,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
