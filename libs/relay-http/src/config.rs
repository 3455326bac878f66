use std::time::Duration;

/// Default User-Agent string for the gateway leg
pub const DEFAULT_USER_AGENT: &str = concat!("gateway-relay/", env!("CARGO_PKG_VERSION"));

/// Environment variable holding the gateway URL for applications that
/// configure the relay from the process environment
pub const GATEWAY_URL_ENV: &str = "RELAY_GATEWAY_URL";

/// Default bounded wait on the gateway call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on the gateway reply size (256 MB)
///
/// Sized for base64-encoded downloads, which grow by a third in the envelope.
pub const DEFAULT_MAX_GATEWAY_RESPONSE_SIZE: usize = 256 * 1024 * 1024;

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration for the gateway leg
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS to reach the gateway (HTTPS only) - default and recommended
    #[default]
    TlsOnly,
    /// Allow a plain HTTP gateway URL (for testing with mock gateways only)
    ///
    /// **WARNING**: The envelope carries the caller's headers, credentials
    /// included. Never use in production.
    AllowInsecureHttp,
}

/// Relay configuration
///
/// Passed explicitly to [`RelayClientBuilder`](crate::RelayClientBuilder);
/// the relay never reads the process environment on its own.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Gateway endpoint every envelope is posted to
    pub gateway_url: String,

    /// Bounded wait on the gateway call (default: 30 seconds)
    ///
    /// A per-call deadline carried in [`CallContext`](crate::CallContext)
    /// can only shorten this.
    pub request_timeout: Duration,

    /// Maximum gateway reply size in bytes (default: 256 MB)
    ///
    /// A 200 reply past it fails with `BodyTooLarge`; a non-200 reply is
    /// cut to this many bytes and still reported by its status.
    pub max_gateway_response_size: usize,

    /// User-Agent sent on the gateway POST (default: `gateway-relay/<version>`)
    ///
    /// The intercepted request's own `User-Agent`, if any, travels inside
    /// the envelope untouched.
    pub user_agent: String,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Timeout for idle pooled connections to the gateway (default: 90 seconds)
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum idle connections kept to the gateway host (default: 32)
    pub pool_max_idle_per_host: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_gateway_response_size: DEFAULT_MAX_GATEWAY_RESPONSE_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl RelayConfig {
    /// Create a configuration with defaults for the given gateway URL
    #[must_use]
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            ..Default::default()
        }
    }

    /// Create configuration for testing with mock gateways (allows insecure HTTP)
    ///
    /// **WARNING**: This configuration allows plain HTTP connections.
    /// Use only for local testing with mock servers, never in production.
    #[must_use]
    pub fn for_testing(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            request_timeout: Duration::from_secs(10),
            max_gateway_response_size: 1024 * 1024, // 1 MB
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::AllowInsecureHttp,
            tls_roots: TlsRootConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
        }
    }
}

/// Read the gateway URL from [`GATEWAY_URL_ENV`].
///
/// Surrounding whitespace is trimmed. Returns `None` when the variable is
/// unset or blank, which callers treat as "relay disabled".
#[must_use]
pub fn gateway_url_from_env() -> Option<String> {
    let raw = std::env::var(GATEWAY_URL_ENV).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
