use proptest::prelude::*;

use quorum_types::{MessageDigest, PeerAddress};

proptest! {
    /// MessageDigest::is_zero is true only for all-zero bytes.
    #[test]
    fn digest_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        let digest = MessageDigest::new(bytes);
        prop_assert_eq!(digest.is_zero(), bytes == [0u8; 32]);
    }

    /// Digest equality agrees with byte equality.
    #[test]
    fn digest_equality_follows_bytes(
        a in prop::array::uniform32(0u8..),
        b in prop::array::uniform32(0u8..),
    ) {
        prop_assert_eq!(MessageDigest::new(a) == MessageDigest::new(b), a == b);
    }

    /// MessageDigest survives the bincode wire encoding unchanged.
    #[test]
    fn digest_bincode_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let digest = MessageDigest::new(bytes);
        let encoded = bincode::serialize(&digest).unwrap();
        let decoded: MessageDigest = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, digest);
    }

    /// PeerAddress displays exactly the string it was built from.
    #[test]
    fn peer_address_display_is_identity(raw in "[a-z0-9.:-]{1,40}") {
        let addr = PeerAddress::new(raw.clone());
        prop_assert_eq!(addr.to_string(), raw);
    }
}
