//! The relay has no retry of its own; these tests show an outer
//! `tower::retry` layer driven by `RelayError::is_retryable`.

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use httpmock::prelude::*;
use relay_http::{
    CallContext, HeaderFields, InboundEnvelope, RelayBody, RelayConfig, RelayError, RelayService,
};
use std::future::{Ready, ready};
use tower::ServiceExt;
use tower::retry::{Policy, Retry};

const GATEWAY_PATH: &str = "/relay";

#[derive(Clone)]
struct RetryGatewayFailures {
    remaining: usize,
}

impl Policy<Request<Full<Bytes>>, Response<RelayBody>, RelayError> for RetryGatewayFailures {
    type Future = Ready<()>;

    fn retry(
        &mut self,
        _req: &mut Request<Full<Bytes>>,
        result: &mut Result<Response<RelayBody>, RelayError>,
    ) -> Option<Self::Future> {
        match result {
            Err(err) if err.is_retryable() && self.remaining > 0 => {
                self.remaining -= 1;
                Some(ready(()))
            }
            _ => None,
        }
    }

    fn clone_request(&mut self, req: &Request<Full<Bytes>>) -> Option<Request<Full<Bytes>>> {
        let mut clone = Request::builder()
            .method(req.method().clone())
            .uri(req.uri().clone())
            .body(req.body().clone())
            .ok()?;
        *clone.headers_mut() = req.headers().clone();
        if let Some(ctx) = req.extensions().get::<CallContext>() {
            clone.extensions_mut().insert(ctx.clone());
        }
        Some(clone)
    }
}

fn relay(server: &MockServer) -> RelayService {
    RelayService::new(&RelayConfig::for_testing(server.url(GATEWAY_PATH))).unwrap()
}

fn request() -> Request<Full<Bytes>> {
    Request::builder()
        .uri("https://api.example.com/v1/items")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[tokio::test]
async fn test_gateway_failures_are_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(GATEWAY_PATH);
        then.status(503).body("gateway unavailable");
    });

    let service = Retry::new(RetryGatewayFailures { remaining: 2 }, relay(&server));
    let err = service.oneshot(request()).await.unwrap_err();

    assert!(err.is_gateway_error());
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn test_inner_failures_are_not_retried() {
    let server = MockServer::start();
    let inbound = InboundEnvelope::with_body(503, HeaderFields::new(), b"destination down");
    let mock = server.mock(|when, then| {
        when.method(POST).path(GATEWAY_PATH);
        then.status(200).json_body(serde_json::to_value(&inbound).unwrap());
    });

    let service = Retry::new(RetryGatewayFailures { remaining: 2 }, relay(&server));
    let resp = service.oneshot(request()).await.unwrap();

    assert_eq!(resp.status(), http::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_cancelled_calls_are_not_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(GATEWAY_PATH);
        then.status(503);
    });

    let ctx = CallContext::new();
    ctx.cancel();
    let mut req = request();
    req.extensions_mut().insert(ctx);

    let service = Retry::new(RetryGatewayFailures { remaining: 2 }, relay(&server));
    let err = service.oneshot(req).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_decode_failures_are_not_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(GATEWAY_PATH);
        then.status(200).body("not an envelope");
    });

    let service = Retry::new(RetryGatewayFailures { remaining: 2 }, relay(&server));
    let err = service.oneshot(request()).await.unwrap_err();

    assert!(matches!(err, RelayError::Decode(_)));
    assert_eq!(mock.calls(), 1);
}
