//! Shared utilities for the quorum gossip layer.

pub mod logging;
pub mod stats;
pub mod sync;

pub use logging::{env_filter, init_tracing};
pub use stats::StatsCounter;
pub use sync::lock;
