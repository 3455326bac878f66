//! The relaying transport: a tower service that never dials the destination.
//!
//! Each intercepted request is drained, wrapped in an [`OutboundEnvelope`],
//! and POSTed to the gateway. A 200 reply is unwrapped from its
//! [`InboundEnvelope`] and handed back as if the destination had answered.

use crate::config::RelayConfig;
use crate::context::CallContext;
use crate::error::RelayError;
use crate::gateway::{GatewayConnector, GatewayReply};
use bytes::Bytes;
use http::{Request, Response, StatusCode, Uri};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use relay_envelope::{InboundEnvelope, OutboundEnvelope};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};

/// Body of a reconstructed response; fully buffered.
pub type RelayBody = Full<Bytes>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Relay diagnostics attached to every reconstructed response as an
/// extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedResponse {
    /// Destination URL of the intercepted request
    pub destination: Uri,
    /// Outer status of the gateway reply (always 200 on success)
    pub gateway_status: StatusCode,
    /// The inner body was not valid base64 and was passed through verbatim
    pub body_fallback: bool,
}

struct RelayInner {
    gateway: GatewayConnector,
    timeout: Duration,
}

/// Tower service that forwards every request through the gateway.
///
/// Cloning is cheap; clones share one connection pool. There is no queue
/// in front of the service, so `poll_ready` is always ready and concurrent
/// calls proceed independently.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl std::fmt::Debug for RelayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayService")
            .field("gateway", self.inner.gateway.endpoint())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl RelayService {
    /// Build a relay bound to `config.gateway_url`.
    ///
    /// # Errors
    /// Returns a config-class error when the gateway URL, its scheme, or the
    /// user agent is invalid, or `RelayError::Tls` if TLS cannot be set up.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        Ok(Self {
            inner: Arc::new(RelayInner {
                gateway: GatewayConnector::new(config)?,
                timeout: config.request_timeout,
            }),
        })
    }

    /// Gateway endpoint envelopes are posted to
    #[must_use]
    pub fn gateway_url(&self) -> &Uri {
        self.inner.gateway.endpoint()
    }

    /// Relay a single request.
    ///
    /// Any [`CallContext`] found in the request extensions governs the
    /// gateway call; cancellation takes precedence over every other outcome.
    ///
    /// # Errors
    /// Inner statuses (4xx, 5xx) are not errors. Errors are returned only
    /// when the request cannot be encoded, the gateway leg fails or answers
    /// with a non-200 outer status, or the 200 reply is not an envelope.
    pub async fn relay<B>(&self, request: Request<B>) -> Result<Response<RelayBody>, RelayError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let ctx = request
            .extensions()
            .get::<CallContext>()
            .cloned()
            .unwrap_or_default();
        let cancel = ctx.token().clone();

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("relay call cancelled");
                Err(RelayError::Cancelled)
            }
            result = self.forward(request, &ctx) => result,
        }
    }

    async fn forward<B>(
        &self,
        request: Request<B>,
        ctx: &CallContext,
    ) -> Result<Response<RelayBody>, RelayError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| RelayError::BodyRead(e.into()))?
            .to_bytes();

        let envelope = OutboundEnvelope::from_parts(&parts.method, &parts.uri, &parts.headers, &body);
        let payload = envelope.to_vec().map_err(RelayError::Encode)?;

        let wait = ctx.remaining(self.inner.timeout);
        tracing::debug!(
            method = %parts.method,
            url = %parts.uri,
            gateway = %self.gateway_url(),
            body_len = body.len(),
            timeout_ms = wait.as_millis(),
            "relaying request through gateway"
        );

        let reply = tokio::time::timeout(wait, self.inner.gateway.post(payload))
            .await
            .map_err(|_| RelayError::Timeout(wait))??;

        let response = reconstruct(&reply, parts.uri)?;
        tracing::debug!(
            method = %parts.method,
            status = response.status().as_u16(),
            "gateway returned inner response"
        );
        Ok(response)
    }
}

/// Turn a gateway reply into the response the caller sees.
fn reconstruct(reply: &GatewayReply, destination: Uri) -> Result<Response<RelayBody>, RelayError> {
    if reply.status != StatusCode::OK {
        let body = String::from_utf8_lossy(&reply.body).into_owned();
        tracing::warn!(
            status = reply.status.as_u16(),
            url = %destination,
            body_truncated = reply.truncated,
            "gateway rejected relayed request"
        );
        return Err(RelayError::GatewayStatus {
            status: reply.status,
            body,
        });
    }

    let inbound = InboundEnvelope::from_slice(&reply.body).map_err(RelayError::Decode)?;
    let status = inbound.status().map_err(RelayError::Decode)?;

    let (headers, rejected) = inbound.header_map();
    for header in &rejected {
        tracing::warn!(header = %header.name, reason = header.reason, "skipping gateway header");
    }

    let body = inbound.decoded_body();
    let body_fallback = body.is_fallback();
    if body_fallback {
        tracing::debug!(url = %destination, "inner body is not base64, passing it through verbatim");
    }

    let mut response = Response::new(Full::new(body.into_bytes()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response.extensions_mut().insert(RelayedResponse {
        destination,
        gateway_status: reply.status,
        body_fallback,
    });
    Ok(response)
}

impl<B> Service<Request<B>> for RelayService
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = Response<RelayBody>;
    type Error = RelayError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.relay(request).await })
    }
}

/// Layer that replaces the wrapped transport with a [`RelayService`].
///
/// Useful at the bottom of a `ServiceBuilder` stack: every layer above it
/// still runs, but the request never reaches the inner service.
#[derive(Clone, Debug)]
pub struct RelayLayer {
    relay: RelayService,
}

impl RelayLayer {
    /// Build a layer around a fresh relay.
    ///
    /// # Errors
    /// Same as [`RelayService::new`].
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        Ok(Self {
            relay: RelayService::new(config)?,
        })
    }

    /// Build a layer that shares an existing relay (and its pool)
    #[must_use]
    pub fn from_service(relay: RelayService) -> Self {
        Self { relay }
    }
}

impl<S> Layer<S> for RelayLayer {
    type Service = RelayService;

    fn layer(&self, _inner: S) -> Self::Service {
        self.relay.clone()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use relay_envelope::HeaderFields;

    fn reply(status: StatusCode, body: &[u8]) -> GatewayReply {
        GatewayReply {
            status,
            body: Bytes::copy_from_slice(body),
            truncated: false,
        }
    }

    fn destination() -> Uri {
        Uri::from_static("https://api.example.com/v1/items")
    }

    #[test]
    fn test_reconstruct_inner_status_headers_and_body() {
        let mut headers = HeaderFields::new();
        headers.insert("Content-Type".to_owned(), "application/json".to_owned());
        let inbound = InboundEnvelope::with_body(201, headers, br#"{"ok":true}"#);

        let response = reconstruct(&reply(StatusCode::OK, &inbound.to_vec().unwrap()), destination())
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["content-type"], "application/json");
        let relayed = response.extensions().get::<RelayedResponse>().unwrap();
        assert_eq!(relayed.destination, destination());
        assert_eq!(relayed.gateway_status, StatusCode::OK);
        assert!(!relayed.body_fallback);
    }

    #[test]
    fn test_reconstruct_inner_error_status_is_not_an_error() {
        let inbound = InboundEnvelope::with_body(500, HeaderFields::new(), b"boom");
        let response = reconstruct(&reply(StatusCode::OK, &inbound.to_vec().unwrap()), destination())
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_reconstruct_outer_status_is_an_error() {
        let err = reconstruct(&reply(StatusCode::FORBIDDEN, b"policy denied"), destination())
            .unwrap_err();
        assert_eq!(
            err.gateway_status(),
            Some((StatusCode::FORBIDDEN, "policy denied"))
        );
    }

    #[test]
    fn test_reconstruct_truncated_outer_body_keeps_status() {
        let truncated = GatewayReply {
            status: StatusCode::BAD_GATEWAY,
            body: Bytes::from_static(b"upstream fail"),
            truncated: true,
        };
        let err = reconstruct(&truncated, destination()).unwrap_err();
        assert_eq!(
            err.gateway_status(),
            Some((StatusCode::BAD_GATEWAY, "upstream fail"))
        );
    }

    #[test]
    fn test_reconstruct_outer_201_is_still_an_error() {
        let err = reconstruct(&reply(StatusCode::CREATED, b"{}"), destination()).unwrap_err();
        assert!(err.is_gateway_error());
    }

    #[test]
    fn test_reconstruct_malformed_envelope() {
        let err = reconstruct(&reply(StatusCode::OK, b"<html>"), destination()).unwrap_err();
        assert!(matches!(err, RelayError::Decode(_)));
    }

    #[test]
    fn test_reconstruct_invalid_inner_status() {
        let err = reconstruct(
            &reply(StatusCode::OK, br#"{"status_code":42,"headers":{},"body":""}"#),
            destination(),
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::Decode(_)));
    }

    #[test]
    fn test_reconstruct_raw_body_fallback() {
        let response = reconstruct(
            &reply(
                StatusCode::OK,
                br#"{"status_code":200,"headers":{},"body":"plain text, not base64!"}"#,
            ),
            destination(),
        )
        .unwrap();
        let relayed = response.extensions().get::<RelayedResponse>().unwrap();
        assert!(relayed.body_fallback);
    }

    #[test]
    fn test_reconstruct_skips_illegal_headers() {
        let response = reconstruct(
            &reply(
                StatusCode::OK,
                br#"{"status_code":200,"headers":{"bad header":"x","x-ok":"1"},"body":""}"#,
            ),
            destination(),
        )
        .unwrap();
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.headers()["x-ok"], "1");
    }

    #[test]
    fn test_skipped_headers_are_logged_without_values() {
        use std::sync::Mutex;
        use tracing_subscriber::layer::SubscriberExt;

        #[derive(Clone, Default)]
        struct WarningCapture {
            events: Arc<Mutex<Vec<String>>>,
        }

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCapture {
            fn on_event(
                &self,
                event: &tracing::Event<'_>,
                _ctx: tracing_subscriber::layer::Context<'_, S>,
            ) {
                if *event.metadata().level() == tracing::Level::WARN {
                    let mut visitor = FieldVisitor(String::new());
                    event.record(&mut visitor);
                    self.events.lock().unwrap().push(visitor.0);
                }
            }
        }

        struct FieldVisitor(String);
        impl tracing::field::Visit for FieldVisitor {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                use std::fmt::Write;
                write!(self.0, "{}={value:?} ", field.name()).unwrap();
            }
        }

        let capture = WarningCapture::default();
        let events = Arc::clone(&capture.events);
        let subscriber = tracing_subscriber::registry().with(capture);

        tracing::subscriber::with_default(subscriber, || {
            reconstruct(
                &reply(
                    StatusCode::OK,
                    br#"{"status_code":200,"headers":{"x-secret":"line\nbreak"},"body":""}"#,
                ),
                destination(),
            )
            .unwrap();
        });

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 1, "expected one warning: {:?}", *captured);
        assert!(captured[0].contains("x-secret"));
        assert!(captured[0].contains("invalid header value"));
        assert!(!captured[0].contains("break"));
    }

    #[tokio::test]
    async fn test_cancelled_before_call_never_reaches_gateway() {
        // Nothing listens on port 1; a cancelled context must win before any dial.
        let relay = RelayService::new(&RelayConfig::for_testing("http://127.0.0.1:1/hook")).unwrap();
        let ctx = CallContext::new();
        ctx.cancel();

        let mut request = Request::new(Full::new(Bytes::new()));
        *request.uri_mut() = destination();
        request.extensions_mut().insert(ctx);

        let err = relay.relay(request).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_retryable() {
        let relay = RelayService::new(&RelayConfig::for_testing("http://127.0.0.1:1/hook")).unwrap();

        let mut request = Request::new(Full::new(Bytes::new()));
        *request.uri_mut() = destination();

        let err = relay.relay(request).await.unwrap_err();
        assert!(err.is_retryable(), "expected a gateway transport error, got {err:?}");
        assert!(!err.is_gateway_error());
    }

    #[test]
    fn test_relay_service_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone + 'static>() {}
        assert_traits::<RelayService>();
        assert_traits::<RelayLayer>();
    }
}
