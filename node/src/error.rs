use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("network error: {0}")]
    Network(#[from] quorum_network::NetworkError),

    #[error("protocol error: {0}")]
    Protocol(#[from] quorum_protocol::ProtocolError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node not started")]
    NotStarted,
}
