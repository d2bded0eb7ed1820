#![no_main]

use libfuzzer_sys::fuzz_target;
use quorum_messages::Envelope;
use quorum_protocol::{decode_frame, encode_frame};

// Frame bodies straight off the wire: the version check and bincode decode
// must reject garbage without panicking, and so must the inner payload.
fuzz_target!(|data: &[u8]| {
    let Ok(frame) = decode_frame(data) else {
        return;
    };
    let _ = Envelope::decode(&frame.payload);

    let body = encode_frame(&frame).expect("decoded frame re-encodes");
    assert_eq!(decode_frame(&body).expect("re-encoded frame decodes"), frame);
});
