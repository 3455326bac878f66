#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_envelope::{DecodedBody, decode_body, encode_body};

fuzz_target!(|data: &[u8]| {
    // Encoded bodies always decode back to the same bytes.
    let decoded = decode_body(&encode_body(data));
    assert!(!decoded.is_fallback());
    assert_eq!(&decoded.into_bytes()[..], data);

    // Text that is not base64 passes through verbatim.
    if let Ok(text) = std::str::from_utf8(data) {
        if let DecodedBody::Raw(raw) = decode_body(text) {
            assert_eq!(&raw[..], data);
        }
    }
});
