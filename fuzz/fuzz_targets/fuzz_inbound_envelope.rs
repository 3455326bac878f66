#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_envelope::InboundEnvelope;

fuzz_target!(|data: &[u8]| {
    // Gateway replies are untrusted; parsing and unpacking must never panic.
    if let Ok(envelope) = InboundEnvelope::from_slice(data) {
        let _ = envelope.status();
        let (headers, rejected) = envelope.header_map();
        assert!(headers.len() + rejected.len() <= envelope.headers.len());
        let _ = envelope.decoded_body().into_bytes();
    }
});
