//! Wire protocol: message framing, encoding/decoding, versioning.

pub mod codec;
pub mod error;
pub mod version;

pub use codec::{decode_frame, encode_frame, read_frame, write_frame, Frame, MAX_FRAME_SIZE};
pub use error::ProtocolError;
pub use version::PROTOCOL_VERSION;
