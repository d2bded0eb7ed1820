//! Inbound side of the TCP transport: accept loop and per-connection
//! frame readers feeding [`NetService::handle_frame`].

use std::sync::Arc;
use std::time::Duration;

use quorum_network::{CommitteeSource, ConsensusCallback, NetService, Transport};
use quorum_protocol::{decode_frame, read_frame, ProtocolError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// An inbound connection with no frame for this long is closed. Live
/// committee members heartbeat well within it.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Accept connections until shutdown, spawning a reader for each.
pub async fn run_listener<T, C, B>(
    listener: TcpListener,
    service: Arc<NetService<T, C, B>>,
    mut shutdown: broadcast::Receiver<()>,
) where
    T: Transport,
    C: CommitteeSource,
    B: ConsensusCallback,
{
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("peer listener shutting down");
                break;
            }
            result = listener.accept() => match result {
                Ok((stream, remote)) => {
                    tracing::debug!(remote = %remote, "inbound connection");
                    let service = Arc::clone(&service);
                    let shutdown = shutdown.resubscribe();
                    tokio::spawn(read_loop(stream, service, shutdown));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}

async fn read_loop<T, C, B>(
    mut stream: TcpStream,
    service: Arc<NetService<T, C, B>>,
    mut shutdown: broadcast::Receiver<()>,
) where
    T: Transport,
    C: CommitteeSource,
    B: ConsensusCallback,
{
    let remote = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".into());

    loop {
        let body = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            read = tokio::time::timeout(READ_TIMEOUT, read_frame(&mut stream)) => match read {
                Err(_) => {
                    tracing::debug!(remote = %remote, "inbound connection idle, closing");
                    break;
                }
                Ok(Ok(Some(body))) => body,
                Ok(Ok(None)) => {
                    tracing::debug!(remote = %remote, "inbound connection closed");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::warn!(remote = %remote, error = %e, "frame read failed, closing");
                    break;
                }
            }
        };

        match decode_frame(&body) {
            Ok(frame) => {
                service.handle_frame(&frame.sender, &frame.payload);
            }
            // The length prefix was intact, so the stream is still in sync.
            Err(e @ (ProtocolError::Malformed(_) | ProtocolError::UnsupportedVersion(_))) => {
                tracing::warn!(remote = %remote, error = %e, "dropping undecodable frame");
            }
            Err(e) => {
                tracing::warn!(remote = %remote, error = %e, "bad frame, closing");
                break;
            }
        }
    }
}
