use crate::auth::{BearerAuthLayer, TokenSupplier};
use crate::client::{ClientService, RelayClient};
use crate::config::{RelayConfig, TlsRootConfig, TransportSecurity};
use crate::error::RelayError;
use crate::relay::RelayService;
use std::sync::Arc;
use std::time::Duration;
use tower::Layer;
use tower::util::BoxCloneSyncService;

/// Builder for [`RelayClient`]
///
/// # Example
///
/// ```ignore
/// use relay_http::RelayClient;
/// use std::time::Duration;
///
/// let client = RelayClient::builder("https://gateway.internal/relay")
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub struct RelayClientBuilder {
    config: RelayConfig,
    token_supplier: Option<Arc<dyn TokenSupplier>>,
}

impl RelayClientBuilder {
    /// Create a builder with default settings for the given gateway
    #[must_use]
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self::with_config(RelayConfig::new(gateway_url))
    }

    /// Create a builder from an explicit configuration
    #[must_use]
    pub fn with_config(config: RelayConfig) -> Self {
        Self {
            config,
            token_supplier: None,
        }
    }

    /// Set the bounded wait on each gateway call
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the User-Agent sent on the gateway POST
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the maximum accepted gateway reply size in bytes
    #[must_use]
    pub fn max_gateway_response_size(mut self, size: usize) -> Self {
        self.config.max_gateway_response_size = size;
        self
    }

    /// Set transport security mode for the gateway leg
    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Allow a plain `http://` gateway (for testing only)
    ///
    /// Equivalent to `.transport(TransportSecurity::AllowInsecureHttp)`.
    /// Only available in debug builds or with the `allow-insecure-http`
    /// feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "relay_http::security",
            "allow_insecure_http() called - envelopes will NOT be encrypted"
        );
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Set the TLS root certificate strategy
    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Set the idle timeout for pooled gateway connections (`None` keeps them forever)
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum number of idle gateway connections
    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Inject `Authorization: Bearer` from `supplier` when a request has none
    #[must_use]
    pub fn with_token_supplier(mut self, supplier: impl TokenSupplier + 'static) -> Self {
        self.token_supplier = Some(Arc::new(supplier));
        self
    }

    /// Build the client
    ///
    /// # Errors
    /// Returns an error if the gateway URL or user agent is invalid, or TLS
    /// initialization fails.
    pub fn build(self) -> Result<RelayClient, RelayError> {
        if self.config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled for the gateway leg (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock gateways"
            );
        }

        let relay = RelayService::new(&self.config)?;
        let service: ClientService = match self.token_supplier {
            Some(supplier) => {
                BoxCloneSyncService::new(BearerAuthLayer::from_arc(supplier).layer(relay.clone()))
            }
            None => BoxCloneSyncService::new(relay.clone()),
        };

        Ok(RelayClient { service, relay })
    }
}
