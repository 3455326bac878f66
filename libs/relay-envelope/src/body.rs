//! Body encoding for envelope `body` fields.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

/// Encode raw request body bytes for an outbound envelope.
///
/// A zero-length body encodes as the empty string, never as the base64
/// encoding of zero bytes.
#[must_use]
pub fn encode_body(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    STANDARD.encode(bytes)
}

/// Result of decoding an inbound envelope `body` field.
///
/// Decoding never fails: text that is not valid standard base64 is passed
/// through as its literal bytes and reported as [`DecodedBody::Raw`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedBody {
    /// The field was the empty string
    Empty,
    /// The field was valid standard base64
    Base64(Bytes),
    /// The field was not base64; these are its literal UTF-8 bytes
    Raw(Bytes),
}

impl DecodedBody {
    /// Whether the raw-text fallback was taken
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Consume into the response body bytes
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Base64(bytes) | Self::Raw(bytes) => bytes,
        }
    }
}

/// Decode an inbound envelope `body` field.
///
/// - `""` decodes to [`DecodedBody::Empty`]
/// - valid standard (padded) base64 decodes to [`DecodedBody::Base64`];
///   `\r` and `\n` are ignored, so line-wrapped (MIME style) base64 decodes
/// - anything else is kept verbatim as [`DecodedBody::Raw`]
#[must_use]
pub fn decode_body(field: &str) -> DecodedBody {
    if field.is_empty() {
        return DecodedBody::Empty;
    }
    let decoded = if field.contains(['\r', '\n']) {
        let unwrapped: String = field.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();
        STANDARD.decode(unwrapped)
    } else {
        STANDARD.decode(field)
    };
    match decoded {
        Ok(decoded) => DecodedBody::Base64(Bytes::from(decoded)),
        Err(_) => DecodedBody::Raw(Bytes::copy_from_slice(field.as_bytes())),
    }
}
