use crate::error::RelayError;
use crate::relay::{RelayBody, RelayedResponse};
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// Reconstructed response with body-reading helpers
///
/// The status, headers and body are the destination's, as reported by the
/// gateway. Inner failures (4xx, 5xx) are ordinary responses; check
/// [`is_success`](RelayResponse::is_success) before trusting the body.
#[derive(Debug)]
pub struct RelayResponse {
    inner: Response<RelayBody>,
}

impl RelayResponse {
    pub(crate) fn new(inner: Response<RelayBody>) -> Self {
        Self { inner }
    }

    /// Inner status reported by the gateway
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Inner headers reported by the gateway
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the inner status is 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    /// Relay diagnostics for this response
    #[must_use]
    pub fn relayed(&self) -> Option<&RelayedResponse> {
        self.inner.extensions().get::<RelayedResponse>()
    }

    /// Whether the body was passed through verbatim because it was not base64
    #[must_use]
    pub fn is_body_fallback(&self) -> bool {
        self.relayed().is_some_and(|r| r.body_fallback)
    }

    /// Consume the response and return the body
    pub async fn bytes(self) -> Bytes {
        let Ok(collected) = self.inner.into_body().collect().await;
        collected.to_bytes()
    }

    /// Consume the response and return the body as (lossy) UTF-8
    pub async fn text(self) -> String {
        String::from_utf8_lossy(&self.bytes().await).into_owned()
    }

    /// Consume the response and parse the body as JSON
    ///
    /// The status is not checked.
    ///
    /// # Errors
    /// Returns `RelayError::Json` if the body is not valid JSON for `T`.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, RelayError> {
        Ok(serde_json::from_slice(&self.bytes().await)?)
    }

    /// The underlying `http::Response`
    #[must_use]
    pub fn into_inner(self) -> Response<RelayBody> {
        self.inner
    }
}
