//! Fundamental types for the quorum gossip layer.
//!
//! Defines the identifiers shared by every other crate in the workspace:
//! committee member addresses, the identity attached to inbound traffic, and
//! the fixed-size digest used to recognise messages that were already seen.

pub mod address;
pub mod digest;

pub use address::{PeerAddress, PeerIdentity};
pub use digest::MessageDigest;
