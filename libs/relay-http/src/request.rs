use crate::client::RelayClient;
use crate::context::CallContext;
use crate::error::RelayError;
use crate::gateway::parse_absolute_uri;
use crate::response::RelayResponse;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Method, Request};
use http_body_util::Full;
use serde::Serialize;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Request builder with a fluent API
///
/// Created by [`RelayClient::get`], [`RelayClient::post`], etc. Header and
/// URL errors are deferred to [`send()`](RequestBuilder::send).
///
/// # Example
///
/// ```ignore
/// let ctx = CallContext::new().timeout(Duration::from_secs(5));
/// let resp = client
///     .post("https://api.example.com/items")
///     .header("x-request-id", "abc123")
///     .json(&NewItem { name: "widget" })?
///     .context(ctx)
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    client: RelayClient,
    method: Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
    json: bool,
    context: Option<CallContext>,
    error: Option<RelayError>,
}

impl RequestBuilder {
    pub(crate) fn new(client: RelayClient, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: Vec::new(),
            body: Bytes::new(),
            json: false,
            context: None,
            error: None,
        }
    }

    /// Add a header. Repeating a name appends a value; only the first value
    /// of each name survives the envelope.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(RelayError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(RelayError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Add several headers
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        for (name, value) in headers {
            self = self.header(&name, &value);
        }
        self
    }

    /// Serialize `body` as the JSON request body.
    ///
    /// Sets `Content-Type: application/json` unless one was provided.
    ///
    /// # Errors
    /// Returns `RelayError::Json` if serialization fails, or any deferred
    /// header error.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, RelayError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        self.body = Bytes::from(serde_json::to_vec(body)?);
        self.json = true;
        Ok(self)
    }

    /// Set the body as raw bytes
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = body;
        self.json = false;
        self
    }

    /// Set the body as a string
    pub fn body_string(self, body: String) -> Self {
        self.body_bytes(Bytes::from(body))
    }

    /// Govern the call with `ctx` (cancellation and deadline)
    pub fn context(mut self, ctx: CallContext) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Abort the call when `token` is cancelled
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        let ctx = CallContext::with_token(token);
        self.context = Some(match self.context.take().and_then(|c| c.deadline_at()) {
            Some(deadline) => ctx.deadline(deadline),
            None => ctx,
        });
        self
    }

    /// Fail the call with a timeout once `deadline` passes
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.context = Some(self.context.take().unwrap_or_default().deadline(deadline));
        self
    }

    /// Relay the request and return the reconstructed response.
    ///
    /// # Errors
    /// Deferred builder errors, an invalid destination URL, or any relay
    /// failure (see [`RelayService::relay`](crate::RelayService::relay)).
    /// Non-2xx inner statuses are returned as `Ok`.
    pub async fn send(mut self) -> Result<RelayResponse, RelayError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let uri = parse_absolute_uri(&self.url)?;
        let mut builder = Request::builder().method(self.method).uri(uri);

        let has_content_type = self.headers.iter().any(|(name, _)| name == CONTENT_TYPE);
        if self.json && !has_content_type {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let mut request = builder.body(Full::new(self.body))?;
        if let Some(ctx) = self.context {
            request.extensions_mut().insert(ctx);
        }

        self.client.send(request).await
    }
}
