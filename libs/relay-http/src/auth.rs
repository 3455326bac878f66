//! Caller-side bearer credentials.
//!
//! The relay itself never authenticates to the gateway; whatever
//! `Authorization` header the intercepted request carries travels inside
//! the envelope. [`BearerAuthLayer`] sits above the relay and fills that
//! header in from a [`TokenSupplier`] when the caller did not set one.

use crate::error::RelayError;
use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{HeaderValue, Request, Response, Uri};
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tower::{Layer, Service};

/// Credential lookup failure
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TokenError {
    #[error("credential unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Source of bearer tokens for intercepted requests.
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    /// Token to present to `destination`.
    async fn token(&self, destination: &Uri) -> Result<SecretString, TokenError>;
}

/// A fixed token, used for every destination.
pub struct StaticToken {
    token: SecretString,
}

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSupplier for StaticToken {
    async fn token(&self, _destination: &Uri) -> Result<SecretString, TokenError> {
        Ok(SecretString::from(self.token.expose_secret().to_owned()))
    }
}

/// Tower layer that injects `Authorization: Bearer <token>` into requests
/// that do not already carry an `Authorization` header.
#[derive(Clone)]
pub struct BearerAuthLayer {
    supplier: Arc<dyn TokenSupplier>,
}

impl BearerAuthLayer {
    #[must_use]
    pub fn new(supplier: impl TokenSupplier + 'static) -> Self {
        Self {
            supplier: Arc::new(supplier),
        }
    }

    #[must_use]
    pub fn from_arc(supplier: Arc<dyn TokenSupplier>) -> Self {
        Self { supplier }
    }
}

impl std::fmt::Debug for BearerAuthLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuthLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService {
            inner,
            supplier: Arc::clone(&self.supplier),
        }
    }
}

/// Service created by [`BearerAuthLayer`].
#[derive(Clone)]
pub struct BearerAuthService<S> {
    inner: S,
    supplier: Arc<dyn TokenSupplier>,
}

impl<S, B, ResBody> Service<Request<B>> for BearerAuthService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>, Error = RelayError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = RelayError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResBody>, RelayError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // Clone-swap: the ready service is the one that handles this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if req.headers().contains_key(AUTHORIZATION) {
            return Box::pin(async move { inner.call(req).await });
        }

        let supplier = Arc::clone(&self.supplier);
        Box::pin(async move {
            let token = supplier
                .token(req.uri())
                .await
                .map_err(RelayError::AuthUnavailable)?;
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
            value.set_sensitive(true);
            req.headers_mut().insert(AUTHORIZATION, value);
            inner.call(req).await
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::Full;
    use tower::ServiceExt;

    /// Echoes the Authorization header back as the response body.
    #[derive(Clone)]
    struct EchoAuth;

    impl Service<Request<Full<Bytes>>> for EchoAuth {
        type Response = Response<Full<Bytes>>;
        type Error = RelayError;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let auth = req
                .headers()
                .get(AUTHORIZATION)
                .map(|v| (v.to_str().unwrap().to_owned(), v.is_sensitive()));
            let body = match auth {
                Some((value, sensitive)) => format!("{value}|{sensitive}"),
                None => String::new(),
            };
            let mut resp = Response::new(Full::new(Bytes::from(body)));
            *resp.status_mut() = StatusCode::OK;
            std::future::ready(Ok(resp))
        }
    }

    struct Unavailable;

    #[async_trait]
    impl TokenSupplier for Unavailable {
        async fn token(&self, destination: &Uri) -> Result<SecretString, TokenError> {
            Err(TokenError::Unavailable {
                reason: format!("no credential for {}", destination.host().unwrap_or("?")),
            })
        }
    }

    fn request() -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::GET)
            .uri("https://api.example.com/items")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn body_text(resp: Response<Full<Bytes>>) -> String {
        use http_body_util::BodyExt;
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_injects_sensitive_bearer_header() {
        let svc = BearerAuthLayer::new(StaticToken::new("tok-123")).layer(EchoAuth);
        let resp = svc.oneshot(request()).await.unwrap();
        assert_eq!(body_text(resp).await, "Bearer tok-123|true");
    }

    #[tokio::test]
    async fn test_existing_authorization_is_kept() {
        let svc = BearerAuthLayer::new(StaticToken::new("tok-123")).layer(EchoAuth);
        let mut req = request();
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));

        let resp = svc.oneshot(req).await.unwrap();
        assert_eq!(body_text(resp).await, "Basic abc|false");
    }

    #[tokio::test]
    async fn test_supplier_failure_surfaces_as_auth_error() {
        let svc = BearerAuthLayer::new(Unavailable).layer(EchoAuth);
        let err = svc.oneshot(request()).await.unwrap_err();
        assert!(matches!(err, RelayError::AuthUnavailable(_)));
        assert!(err.to_string().contains("api.example.com"));
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let svc = BearerAuthLayer::new(StaticToken::new("bad\ntoken")).layer(EchoAuth);
        let err = svc.oneshot(request()).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidHeaderValue(_)));
    }

    #[test]
    fn test_static_token_debug_is_redacted() {
        let debug = format!("{:?}", StaticToken::new("tok-123"));
        assert!(!debug.contains("tok-123"));
    }
}
