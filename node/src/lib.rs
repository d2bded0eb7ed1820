//! Quorum gossip node: wires the gossip service to a TCP transport, a
//! configured committee and the node's ambient services.
//!
//! The node is the central coordinator that:
//! - Loads configuration and initialises logging
//! - Accepts inbound peer connections and dispatches their frames
//! - Dials committee members lazily for outbound gossip and heartbeats
//! - Mirrors gossip statistics into Prometheus gauges
//! - Shuts everything down on SIGINT/SIGTERM

pub mod committee;
pub mod config;
pub mod consensus;
pub mod error;
pub mod listener;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;
pub mod transport;

pub use committee::StaticCommittee;
pub use config::NodeConfig;
pub use consensus::LoggingConsensus;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::{GossipSample, NodeMetrics};
pub use node::{GossipNode, NodeService};
pub use shutdown::ShutdownController;
pub use transport::TcpTransport;
