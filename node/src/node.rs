//! A runnable gossip node: TCP transport, static committee, logging
//! consensus stand-in and the gossip service, plus the background tasks
//! that tie them to the network.

use std::net::SocketAddr;
use std::sync::Arc;

use quorum_messages::Message;
use quorum_network::{BroadcastOutcome, CommitteeSource, NetService};
use quorum_types::PeerAddress;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::committee::StaticCommittee;
use crate::config::NodeConfig;
use crate::consensus::LoggingConsensus;
use crate::listener::run_listener;
use crate::metrics::{GossipSample, NodeMetrics};
use crate::shutdown::ShutdownController;
use crate::transport::TcpTransport;
use crate::NodeError;

pub type NodeService = NetService<TcpTransport, StaticCommittee, LoggingConsensus>;

/// A running gossip node.
pub struct GossipNode {
    pub config: NodeConfig,
    pub service: Arc<NodeService>,
    pub committee: Arc<StaticCommittee>,
    pub consensus: Arc<LoggingConsensus>,
    pub transport: Arc<TcpTransport>,
    pub metrics: Option<Arc<NodeMetrics>>,
    pub shutdown: Arc<ShutdownController>,
    local_addr: Option<SocketAddr>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
}

impl GossipNode {
    /// Build a node from `config`. Nothing is bound or spawned until
    /// [`start`](GossipNode::start).
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let local = PeerAddress::from(config.self_address.as_str());

        let transport = Arc::new(TcpTransport::new(local.clone(), config.connect_timeout()));
        let committee = Arc::new(StaticCommittee::new(local.clone(), &config.committee));
        let consensus = Arc::new(LoggingConsensus::new());
        let service = Arc::new(NetService::new(
            local,
            config.gossip.clone(),
            Arc::clone(&transport),
            Arc::clone(&committee),
            Arc::clone(&consensus),
        )?);
        let metrics = if config.enable_metrics {
            Some(Arc::new(NodeMetrics::new()?))
        } else {
            None
        };

        Ok(Self {
            config,
            service,
            committee,
            consensus,
            transport,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            local_addr: None,
            task_handles: Vec::new(),
        })
    }

    /// Bind `listen_address` and start every background task.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        let listener = TcpListener::bind(self.config.listen_address.as_str()).await?;
        self.start_with_listener(listener)
    }

    /// Start on an already bound listener.
    pub fn start_with_listener(&mut self, listener: TcpListener) -> Result<(), NodeError> {
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        tracing::info!(
            listen = %local_addr,
            self_address = %self.config.self_address,
            committee = self.committee.committee_size(),
            "gossip node starting"
        );

        self.service.start()?;

        let listener_handle = tokio::spawn(run_listener(
            listener,
            Arc::clone(&self.service),
            self.shutdown.subscribe(),
        ));
        self.task_handles.push(listener_handle);

        if let Some(metrics) = &self.metrics {
            let handle = tokio::spawn(sample_metrics(
                Arc::clone(&self.service),
                Arc::clone(&self.committee),
                Arc::clone(metrics),
                self.config.metrics_interval(),
                Arc::clone(&self.shutdown),
            ));
            self.task_handles.push(handle);
        }
        Ok(())
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        self.local_addr.ok_or(NodeError::NotStarted)
    }

    /// Gossip a message originated by this node.
    pub fn broadcast(&self, message: Message) -> Result<BroadcastOutcome, NodeError> {
        Ok(self.service.broadcast(message)?)
    }

    /// Report committed heights to the gossip layer.
    pub fn on_block_committed(&self, block: u64, key_block: u64) -> usize {
        self.service.on_block_committed(block, key_block)
    }

    /// Replace the committee and drain queues of departed members.
    pub fn reconfigure(&self, members: &[String]) -> usize {
        self.committee.replace(members);
        self.service.adjust_committee()
    }

    /// Start, wait for SIGINT/SIGTERM, then stop.
    pub async fn run_until_signal(&mut self) -> Result<(), NodeError> {
        self.start().await?;
        self.shutdown.wait_for_signal().await;
        self.stop().await
    }

    /// Signal every task and wait for them to exit.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("gossip node stopping");
        self.shutdown.shutdown();
        self.service.shutdown().await;
        self.transport.disconnect_all();

        for handle in self.task_handles.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "node task terminated abnormally");
            }
        }
        tracing::info!(stats = ?self.service.stats(), "gossip node stopped");
        Ok(())
    }
}

async fn sample_metrics(
    service: Arc<NodeService>,
    committee: Arc<StaticCommittee>,
    metrics: Arc<NodeMetrics>,
    interval: std::time::Duration,
    shutdown: Arc<ShutdownController>,
) {
    let mut shutdown_rx = shutdown.subscribe();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    while !shutdown.is_triggered() {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let sample = GossipSample {
                    events: service.stats(),
                    dedup_entries: service.dedup_len(),
                    active_workers: service.active_workers(),
                    committee_size: committee.committee_size(),
                    progress: service.progress(),
                };
                metrics.record(&sample);
                tracing::debug!(
                    dedup = sample.dedup_entries,
                    workers = sample.active_workers,
                    "metrics sampled"
                );
            }
        }
    }
}
