//! Nullable infrastructure for deterministic testing.
//!
//! Inspired by the "A-frame architecture" pattern from RsNano.
//! The collaborators of the gossip service (transport, committee source,
//! consensus callback) are abstracted behind traits. This crate provides
//! test-friendly implementations that:
//! - Record what was sent or delivered instead of touching the network
//! - Can be controlled programmatically (delays, failures, in-flight counts)
//! - Work with tokio's paused clock, so timer-driven tests are deterministic
//!
//! Usage: swap real implementations for nullables in tests.

pub mod committee;
pub mod consensus;
pub mod network;

pub use committee::NullCommittee;
pub use consensus::NullConsensus;
pub use network::NullTransport;

