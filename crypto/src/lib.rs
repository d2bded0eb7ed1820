//! Cryptographic primitives for the quorum gossip layer.
//!
//! - **Blake2b-256** for message digests (gossip dedup keys)

pub mod hash;

pub use hash::{blake2b_256, blake2b_256_multi, digest_bytes};
