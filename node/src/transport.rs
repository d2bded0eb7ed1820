//! TCP reference transport.
//!
//! One lazily dialled outbound stream per committee member, used only for
//! writing. Inbound traffic arrives on connections the other side dialled
//! and is handled by [`crate::listener`]. Every frame names its sender, so
//! the two directions never need to be paired.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quorum_messages::Envelope;
use quorum_network::{NetworkError, Transport};
use quorum_protocol::{write_frame, Frame};
use quorum_types::PeerAddress;
use quorum_utils::lock;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;

type Writer = Arc<tokio::sync::Mutex<OwnedWriteHalf>>;

pub struct TcpTransport {
    local: PeerAddress,
    connect_timeout: Duration,
    connections: Mutex<HashMap<PeerAddress, Writer>>,
    in_flight: Mutex<HashMap<PeerAddress, usize>>,
}

/// Counts one send as in flight until dropped.
struct InFlight<'a> {
    transport: &'a TcpTransport,
    peer: &'a PeerAddress,
}

impl<'a> InFlight<'a> {
    fn begin(transport: &'a TcpTransport, peer: &'a PeerAddress) -> Self {
        *lock(&transport.in_flight).entry(peer.clone()).or_default() += 1;
        Self { transport, peer }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(n) = lock(&self.transport.in_flight).get_mut(self.peer) {
            *n = n.saturating_sub(1);
        }
    }
}

impl TcpTransport {
    pub fn new(local: PeerAddress, connect_timeout: Duration) -> Self {
        Self {
            local,
            connect_timeout,
            connections: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Number of open outbound streams.
    pub fn connection_count(&self) -> usize {
        lock(&self.connections).len()
    }

    /// Drop every outbound stream.
    pub fn disconnect_all(&self) {
        lock(&self.connections).clear();
    }

    async fn writer(&self, peer: &PeerAddress) -> Result<Writer, NetworkError> {
        let existing = lock(&self.connections).get(peer).cloned();
        if let Some(writer) = existing {
            return Ok(writer);
        }

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(peer.as_str()))
            .await
            .map_err(|_| NetworkError::Unreachable(peer.clone()))?
            .map_err(|e| NetworkError::SendFailed {
                peer: peer.clone(),
                reason: format!("connect: {e}"),
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %peer, error = %e, "couldn't set TCP_NODELAY");
        }
        let (_read, write) = stream.into_split();
        let writer: Writer = Arc::new(tokio::sync::Mutex::new(write));
        lock(&self.connections).insert(peer.clone(), Arc::clone(&writer));
        tracing::debug!(peer = %peer, "outbound connection established");
        Ok(writer)
    }

    fn forget(&self, peer: &PeerAddress) {
        lock(&self.connections).remove(peer);
    }
}

impl Transport for TcpTransport {
    async fn send_direct(&self, peer: &PeerAddress, envelope: &Envelope) -> Result<(), NetworkError> {
        let _in_flight = InFlight::begin(self, peer);
        let frame = Frame::new(self.local.clone(), envelope).map_err(|e| {
            NetworkError::SendFailed {
                peer: peer.clone(),
                reason: e.to_string(),
            }
        })?;

        let writer = self.writer(peer).await?;
        let mut stream = writer.lock().await;
        if let Err(e) = write_frame(&mut *stream, &frame).await {
            drop(stream);
            self.forget(peer);
            return Err(NetworkError::SendFailed {
                peer: peer.clone(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    fn in_flight(&self, peer: &PeerAddress) -> usize {
        lock(&self.in_flight).get(peer).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_messages::{HeartbeatMsg, Message};
    use quorum_protocol::{decode_frame, read_frame};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn frames_carry_the_local_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer = PeerAddress::from(listener.local_addr().unwrap().to_string());
        let transport = TcpTransport::new(PeerAddress::from("10.9.9.9:7100"), Duration::from_secs(1));

        let envelope = Envelope::direct(Message::Heartbeat(HeartbeatMsg { block_number: 3 }));
        transport.send_direct(&peer, &envelope).await.unwrap();
        transport.send_direct(&peer, &envelope).await.unwrap();
        assert_eq!(transport.connection_count(), 1);
        assert_eq!(transport.in_flight(&peer), 0);

        let (mut stream, _) = listener.accept().await.unwrap();
        for _ in 0..2 {
            let body = read_frame(&mut stream).await.unwrap().unwrap();
            let frame = decode_frame(&body).unwrap();
            assert_eq!(frame.sender.as_str(), "10.9.9.9:7100");
            assert_eq!(Envelope::decode(&frame.payload).unwrap(), envelope);
        }
    }

    #[tokio::test]
    async fn unreachable_peer_fails_the_send() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let transport = TcpTransport::new(PeerAddress::from("a:1"), Duration::from_secs(1));
        let envelope = Envelope::direct(Message::Heartbeat(HeartbeatMsg { block_number: 0 }));
        let result = transport
            .send_direct(&PeerAddress::from(addr.to_string()), &envelope)
            .await;
        assert!(result.is_err());
        assert_eq!(transport.connection_count(), 0);
    }
}
