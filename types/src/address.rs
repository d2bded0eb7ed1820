//! Committee member addressing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Network address of a committee member (e.g. `"10.0.0.7:7100"`).
///
/// Opaque to the gossip layer: two addresses are the same peer iff the
/// strings are equal. Stable for the member's tenure in the committee.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PeerAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of the peer a message arrived from, as resolved by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerIdentity {
    pub address: PeerAddress,
}

impl PeerIdentity {
    pub fn new(address: PeerAddress) -> Self {
        Self { address }
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl From<PeerAddress> for PeerIdentity {
    fn from(address: PeerAddress) -> Self {
        Self { address }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_compare_by_string() {
        assert_eq!(PeerAddress::from("1.2.3.4:7100"), PeerAddress::new("1.2.3.4:7100"));
        assert_ne!(PeerAddress::from("1.2.3.4:7100"), PeerAddress::from("1.2.3.4:7101"));
    }

    #[test]
    fn identity_displays_address() {
        let id = PeerIdentity::from(PeerAddress::from("node-a:7100"));
        assert_eq!(id.to_string(), "node-a:7100");
    }
}
