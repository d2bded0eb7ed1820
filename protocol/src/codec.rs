//! Frame codec: what one peer writes to another's stream.
//!
//! A frame on the wire is a 4-byte big-endian length followed by a bincode
//! encoded [`Frame`]. The frame names its sender explicitly because the
//! TCP source port of an inbound connection is ephemeral and says nothing
//! about which committee member dialled in. The envelope travels as opaque
//! bytes so a receiver can reject a bad message without dropping the
//! connection it came on.

use quorum_messages::Envelope;
use quorum_types::PeerAddress;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::version::{is_compatible, PROTOCOL_VERSION};
use crate::ProtocolError;

/// Maximum encoded frame body in bytes.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// One unit of peer-to-peer traffic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub version: u16,
    /// Listening address of the sending committee member.
    pub sender: PeerAddress,
    /// Encoded [`Envelope`].
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(sender: PeerAddress, envelope: &Envelope) -> Result<Self, ProtocolError> {
        let payload = envelope
            .encode()
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Ok(Self::from_payload(sender, payload))
    }

    pub fn from_payload(sender: PeerAddress, payload: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sender,
            payload,
        }
    }
}

/// Encode a frame body (without the length prefix).
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    let body = bincode::serialize(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(body)
}

/// Decode a frame body and check its protocol version.
pub fn decode_frame(body: &[u8]) -> Result<Frame, ProtocolError> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let frame: Frame =
        bincode::deserialize(body).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if !is_compatible(frame.version) {
        return Err(ProtocolError::UnsupportedVersion(frame.version));
    }
    Ok(frame)
}

/// Write a length-prefixed frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let body = encode_frame(frame)?;
    let len_bytes = (body.len() as u32).to_be_bytes();
    writer.write_all(&len_bytes).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame. Returns `Ok(None)` on a clean EOF at a
/// frame boundary.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_messages::{HeartbeatMsg, Message};

    fn heartbeat_frame() -> Frame {
        Frame::new(
            PeerAddress::from("10.0.0.1:7100"),
            &Envelope::direct(Message::Heartbeat(HeartbeatMsg { block_number: 42 })),
        )
        .unwrap()
    }

    #[test]
    fn payload_carries_the_envelope() {
        let frame = decode_frame(&encode_frame(&heartbeat_frame()).unwrap()).unwrap();
        let envelope = Envelope::decode(&frame.payload).unwrap();
        assert_eq!(
            envelope.message,
            Message::Heartbeat(HeartbeatMsg { block_number: 42 })
        );
        assert!(!envelope.is_gossip());
    }

    #[test]
    fn garbage_payload_still_frames() {
        let frame = Frame::from_payload(PeerAddress::from("a:1"), vec![0xff; 3]);
        let decoded = decode_frame(&encode_frame(&frame).unwrap()).unwrap();
        assert_eq!(decoded.payload, vec![0xff; 3]);
        assert!(Envelope::decode(&decoded.payload).is_err());
    }

    #[test]
    fn decode_rejects_unknown_version() {
        let mut frame = heartbeat_frame();
        frame.version = PROTOCOL_VERSION + 1;
        let body = bincode::serialize(&frame).unwrap();
        assert!(matches!(
            decode_frame(&body),
            Err(ProtocolError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn decode_rejects_truncated_body() {
        let body = encode_frame(&heartbeat_frame()).unwrap();
        assert!(matches!(
            decode_frame(&body[..body.len() / 2]),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn framed_stream_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let frame = heartbeat_frame();
        write_frame(&mut client, &frame).await.unwrap();
        drop(client);

        let body = read_frame(&mut server).await.unwrap().expect("one frame");
        assert_eq!(decode_frame(&body).unwrap(), frame);
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client
            .write_all(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes())
            .await
            .unwrap();
        assert!(matches!(
            read_frame(&mut server).await,
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }
}
