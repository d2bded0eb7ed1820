#![no_main]

use libfuzzer_sys::fuzz_target;
use quorum_messages::Envelope;

// Decoding arbitrary bytes as an envelope must never panic, and anything
// that decodes must re-encode and digest cleanly.
fuzz_target!(|data: &[u8]| {
    let Ok(envelope) = Envelope::decode(data) else {
        return;
    };
    let encoded = envelope.encode().expect("decoded envelope re-encodes");
    let again = Envelope::decode(&encoded).expect("re-encoded envelope decodes");
    assert_eq!(again, envelope);
    assert_eq!(
        again.digest().expect("digest"),
        envelope.digest().expect("digest")
    );
});
