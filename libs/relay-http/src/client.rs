use crate::builder::RelayClientBuilder;
use crate::error::RelayError;
use crate::relay::{RelayBody, RelayService};
use crate::request::RequestBuilder;
use crate::response::RelayResponse;
use bytes::Bytes;
use http::{Method, Request, Response, Uri};
use http_body_util::Full;
use tower::ServiceExt;
use tower::util::BoxCloneSyncService;

/// Type-erased stack the client dispatches through: optional bearer
/// injection over the relay.
pub type ClientService = BoxCloneSyncService<Request<Full<Bytes>>, Response<RelayBody>, RelayError>;

/// Convenience client over the relay
///
/// Requests built here never reach their destination directly; every call
/// is carried to the gateway inside an envelope. Use [`RelayClient::service`]
/// to get the bare tower service for embedding in other stacks.
///
/// `RelayClient` is `Clone + Send + Sync`; clones share one connection pool.
///
/// # Example
///
/// ```ignore
/// let client = RelayClient::builder("https://gateway.internal/relay").build()?;
/// let resp = client.get("https://api.example.com/v1/items").send().await?;
/// if !resp.is_success() {
///     // an inner failure: the destination answered, just not with 2xx
/// }
/// ```
#[derive(Clone)]
pub struct RelayClient {
    pub(crate) service: ClientService,
    pub(crate) relay: RelayService,
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}

impl RelayClient {
    /// Create a builder for a client bound to `gateway_url`
    #[must_use]
    pub fn builder(gateway_url: impl Into<String>) -> RelayClientBuilder {
        RelayClientBuilder::new(gateway_url)
    }

    /// Gateway endpoint envelopes are posted to
    #[must_use]
    pub fn gateway_url(&self) -> &Uri {
        self.relay.gateway_url()
    }

    /// The bare relay service, without any bearer injection
    #[must_use]
    pub fn service(&self) -> RelayService {
        self.relay.clone()
    }

    /// Start a request with an arbitrary method
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, url.to_owned())
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Start a POST request
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Start a PUT request
    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Start a PATCH request
    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    /// Start a DELETE request
    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Relay a fully built request
    ///
    /// # Errors
    /// See [`RelayService::relay`]; additionally `RelayError::AuthUnavailable`
    /// when a token supplier is configured and fails.
    pub async fn send(&self, request: Request<Full<Bytes>>) -> Result<RelayResponse, RelayError> {
        let inner = self.service.clone().oneshot(request).await?;
        Ok(RelayResponse::new(inner))
    }
}
