#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Envelope codec for the gateway relay wire protocol
//!
//! The relay never talks to a destination API directly. Each outbound HTTP
//! request is wrapped into an [`OutboundEnvelope`] and posted to a gateway,
//! which answers with an [`InboundEnvelope`] describing the proxied outcome.
//!
//! This crate holds the pure, stateless half of that exchange:
//! - Body encoding: standard base64, with the empty string as the canonical
//!   "no body" form on the outbound side
//! - Body decoding: base64 with an explicit raw-text fallback (see [`decode_body`])
//! - Header flattening: one value per header name, first value wins
//!
//! No I/O happens here; the transport lives in `relay-http`.
//!
//! # Example
//!
//! ```
//! use relay_envelope::{InboundEnvelope, decode_body};
//!
//! let reply = br#"{"status_code":200,"headers":{"X":"ok"},"body":"eyJyIjoxfQ=="}"#;
//! let inbound = InboundEnvelope::from_slice(reply).unwrap();
//!
//! assert_eq!(inbound.status_code, 200);
//! assert_eq!(&decode_body(&inbound.body).into_bytes()[..], br#"{"r":1}"#);
//! ```

mod body;
mod envelope;
mod error;
mod headers;

pub use body::{DecodedBody, decode_body, encode_body};
pub use envelope::{InboundEnvelope, OutboundEnvelope, RejectedHeader};
pub use error::EnvelopeError;
pub use headers::{HeaderFields, canonical_header_name, flatten_headers};
