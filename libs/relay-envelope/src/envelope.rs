//! Outbound and inbound envelope shapes.

use crate::body::{DecodedBody, decode_body, encode_body};
use crate::error::EnvelopeError;
use crate::headers::{HeaderFields, flatten_headers};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde::{Deserialize, Deserializer, Serialize};

/// Request envelope, relay to gateway.
///
/// `body` is the base64 of the raw request body, or `""` when there is none.
/// It is never `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    /// HTTP method of the intercepted request
    pub method: String,
    /// Full absolute URL, query string included
    pub url: String,
    /// First value of every request header
    pub headers: HeaderFields,
    /// Base64 request body, `""` for none
    pub body: String,
}

impl OutboundEnvelope {
    /// Build an envelope from the parts of an intercepted request.
    #[must_use]
    pub fn from_parts(method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Self {
        Self {
            method: method.as_str().to_owned(),
            url: uri.to_string(),
            headers: flatten_headers(headers),
            body: encode_body(body),
        }
    }

    /// Serialize to the JSON bytes posted to the gateway.
    ///
    /// # Errors
    /// Returns `EnvelopeError::Serialize` if JSON serialization fails.
    pub fn to_vec(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(EnvelopeError::Serialize)
    }

    /// Parse an outbound envelope (the gateway side of the exchange).
    ///
    /// # Errors
    /// Returns `EnvelopeError::Malformed` if the payload is not a valid envelope.
    pub fn from_slice(payload: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(payload).map_err(EnvelopeError::Malformed)
    }

    /// Decoded request body bytes.
    #[must_use]
    pub fn decoded_body(&self) -> DecodedBody {
        decode_body(&self.body)
    }
}

/// Response envelope, gateway to relay.
///
/// `status_code` is the outcome of the proxied call and is carried as-is:
/// 4xx and 5xx values are ordinary results, not failures. Missing or `null`
/// `headers` and `body` read as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// Inner status of the proxied call
    pub status_code: u16,
    /// Flat response header set
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HeaderFields,
    /// Base64 response body; plain text is tolerated
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
}

/// Inbound header entry that could not be turned into an HTTP header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedHeader {
    /// Header name as sent by the gateway
    pub name: String,
    /// Which half was illegal
    pub reason: &'static str,
}

impl InboundEnvelope {
    /// Build an envelope whose body is base64-encoded from raw bytes.
    #[must_use]
    pub fn with_body(status_code: u16, headers: HeaderFields, body: &[u8]) -> Self {
        Self {
            status_code,
            headers,
            body: encode_body(body),
        }
    }

    /// Parse the gateway reply.
    ///
    /// # Errors
    /// Returns `EnvelopeError::Malformed` if the payload is not a valid envelope.
    pub fn from_slice(payload: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(payload).map_err(EnvelopeError::Malformed)
    }

    /// Serialize to JSON bytes (the gateway side of the exchange).
    ///
    /// # Errors
    /// Returns `EnvelopeError::Serialize` if JSON serialization fails.
    pub fn to_vec(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(EnvelopeError::Serialize)
    }

    /// Inner status as an HTTP status code.
    ///
    /// # Errors
    /// Returns `EnvelopeError::InvalidStatus` if the value is outside `100..=999`.
    pub fn status(&self) -> Result<StatusCode, EnvelopeError> {
        StatusCode::from_u16(self.status_code)
            .map_err(|_| EnvelopeError::InvalidStatus(self.status_code))
    }

    /// Inner headers as a header map.
    ///
    /// Entries whose name or value is not legal in HTTP are left out and
    /// returned alongside the map so the caller can report them.
    #[must_use]
    pub fn header_map(&self) -> (HeaderMap, Vec<RejectedHeader>) {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        let mut rejected = Vec::new();

        for (name, value) in &self.headers {
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                rejected.push(RejectedHeader {
                    name: name.clone(),
                    reason: "invalid header name",
                });
                continue;
            };
            let Ok(header_value) = HeaderValue::from_str(value) else {
                rejected.push(RejectedHeader {
                    name: name.clone(),
                    reason: "invalid header value",
                });
                continue;
            };
            map.insert(header_name, header_value);
        }

        (map, rejected)
    }

    /// Decoded response body, with raw-text fallback.
    #[must_use]
    pub fn decoded_body(&self) -> DecodedBody {
        decode_body(&self.body)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
