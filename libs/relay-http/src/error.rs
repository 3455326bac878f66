use crate::auth::TokenError;
use relay_envelope::EnvelopeError;
use std::time::Duration;
use thiserror::Error;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL is missing required scheme (http/https)
    MissingScheme,
}

/// Coarse error class, for callers (retry layers in particular) that only
/// need to know which leg of the relay failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RelayErrorKind {
    /// The intercepted request could not be turned into an envelope
    Encoding,
    /// The gateway could not be reached, timed out, was cancelled, or
    /// answered with a non-200 outer status
    GatewayTransport,
    /// The gateway answered 200 but the body is not a usable envelope
    EnvelopeDecode,
    /// Invalid relay configuration or request target
    Config,
    /// Caller-side credential lookup failed
    Auth,
    /// JSON helper on the client facade failed
    Payload,
}

/// Relay error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    /// Reading the intercepted request body failed
    #[error("Failed to read request body: {0}")]
    BodyRead(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The outbound envelope could not be serialized
    #[error("Failed to encode envelope: {0}")]
    Encode(#[source] EnvelopeError),

    /// Building the gateway request or the reconstructed response failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Gateway answered with a non-200 outer status
    ///
    /// `body` is the raw outer response body, verbatim (lossy UTF-8).
    #[error("Gateway returned status {status}: {body}")]
    GatewayStatus {
        status: http::StatusCode,
        body: String,
    },

    /// Network error on the gateway leg (connect, DNS, reset, etc)
    #[error("Gateway transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS setup error for the gateway leg
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Gateway call exceeded the configured timeout or the call deadline
    #[error("Gateway call timed out after {0:?}")]
    Timeout(Duration),

    /// The governing call context was cancelled
    #[error("Gateway call cancelled")]
    Cancelled,

    /// Gateway reply exceeded the configured size limit
    #[error("Gateway response too large: limit {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Gateway answered 200 with something that is not an inbound envelope
    #[error("Failed to decode gateway envelope: {0}")]
    Decode(#[source] EnvelopeError),

    /// Invalid URL (failed to parse)
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field contains
    /// a diagnostic message intended for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        /// The URL that failed to parse
        url: String,
        /// Structured failure classification for programmatic matching
        kind: InvalidUriKind,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// Invalid URL scheme for transport security configuration
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme {
        /// The URL scheme that was rejected
        scheme: String,
        /// Reason the scheme was rejected
        reason: String,
    },

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Bearer token could not be obtained for the destination
    #[error("Credential unavailable: {0}")]
    AuthUnavailable(#[source] TokenError),

    /// JSON (de)serialization of a caller payload failed
    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl RelayError {
    /// Error class discriminator
    #[must_use]
    pub fn kind(&self) -> RelayErrorKind {
        match self {
            Self::BodyRead(_) | Self::Encode(_) | Self::RequestBuild(_) => {
                RelayErrorKind::Encoding
            }
            Self::GatewayStatus { .. }
            | Self::Transport(_)
            | Self::Tls(_)
            | Self::Timeout(_)
            | Self::Cancelled
            | Self::BodyTooLarge { .. } => RelayErrorKind::GatewayTransport,
            Self::Decode(_) => RelayErrorKind::EnvelopeDecode,
            Self::InvalidUri { .. }
            | Self::InvalidScheme { .. }
            | Self::InvalidHeaderName(_)
            | Self::InvalidHeaderValue(_) => RelayErrorKind::Config,
            Self::AuthUnavailable(_) => RelayErrorKind::Auth,
            Self::Json(_) => RelayErrorKind::Payload,
        }
    }

    /// Whether the gateway answered with a non-200 outer status
    #[must_use]
    pub fn is_gateway_error(&self) -> bool {
        matches!(self, Self::GatewayStatus { .. })
    }

    /// Outer status and raw body of a [`RelayError::GatewayStatus`]
    #[must_use]
    pub fn gateway_status(&self) -> Option<(http::StatusCode, &str)> {
        match self {
            Self::GatewayStatus { status, body } => Some((*status, body.as_str())),
            _ => None,
        }
    }

    /// Whether the call was aborted through its [`CallContext`](crate::CallContext)
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the gateway call ran out of time
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether an outer retry layer may safely re-issue the call.
    ///
    /// Gateway transport failures qualify, since no proxied side effect is
    /// guaranteed to have happened. Cancellation does not: the caller asked
    /// for the call to stop.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == RelayErrorKind::GatewayTransport && !self.is_cancelled()
    }
}

impl From<hyper::Error> for RelayError {
    fn from(err: hyper::Error) -> Self {
        RelayError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for RelayError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        RelayError::Transport(Box::new(err))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fmt;

    #[derive(Debug)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Error for TestError {}

    fn gateway_502() -> RelayError {
        RelayError::GatewayStatus {
            status: http::StatusCode::BAD_GATEWAY,
            body: "bad gateway".to_owned(),
        }
    }

    #[test]
    fn test_gateway_status_accessors() {
        let err = gateway_502();
        assert!(err.is_gateway_error());
        assert_eq!(
            err.gateway_status(),
            Some((http::StatusCode::BAD_GATEWAY, "bad gateway"))
        );
        assert_eq!(err.kind(), RelayErrorKind::GatewayTransport);
        assert_eq!(err.to_string(), "Gateway returned status 502 Bad Gateway: bad gateway");
    }

    #[test]
    fn test_other_errors_are_not_gateway_errors() {
        let err = RelayError::Timeout(Duration::from_secs(30));
        assert!(!err.is_gateway_error());
        assert_eq!(err.gateway_status(), None);
        assert!(err.is_timeout());
    }

    #[test]
    fn test_retry_classification() {
        assert!(gateway_502().is_retryable());
        assert!(RelayError::Transport(Box::new(TestError("connection refused"))).is_retryable());
        assert!(RelayError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(RelayError::BodyTooLarge { limit: 1 }.is_retryable());

        assert!(!RelayError::Cancelled.is_retryable());
        assert!(!RelayError::BodyRead(Box::new(TestError("stream reset"))).is_retryable());

        let garbage = relay_envelope::InboundEnvelope::from_slice(b"not json").unwrap_err();
        let decode = RelayError::Decode(garbage);
        assert_eq!(decode.kind(), RelayErrorKind::EnvelopeDecode);
        assert!(!decode.is_retryable());
    }

    #[test]
    fn test_cancelled_is_not_a_timeout() {
        let err = RelayError::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_timeout());
        assert_eq!(err.kind(), RelayErrorKind::GatewayTransport);
    }

    #[test]
    fn test_transport_error_preserves_source() {
        let err = RelayError::Transport(Box::new(TestError("connection refused")));

        let source = err.source();
        assert!(source.is_some(), "Transport error should have a source");

        let downcast = source.unwrap().downcast_ref::<TestError>();
        assert!(downcast.is_some(), "Should be able to downcast to TestError");
        assert_eq!(downcast.unwrap().0, "connection refused");
    }

    #[test]
    fn test_auth_error_kind() {
        let err = RelayError::AuthUnavailable(TokenError::Unavailable {
            reason: "keychain locked".to_owned(),
        });
        assert_eq!(err.kind(), RelayErrorKind::Auth);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("keychain locked"));
    }
}
