//! The gateway leg: one JSON POST per intercepted request.

use crate::config::{RelayConfig, TransportSecurity};
use crate::error::{InvalidUriKind, RelayError};
use crate::tls::build_https_connector;
use bytes::{Bytes, BytesMut};
use http::header::{ACCEPT, CONTENT_TYPE, HeaderValue, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};

type GatewayHttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

const APPLICATION_JSON: &str = "application/json";

/// Parse an absolute URL (scheme and authority required).
///
/// # Errors
/// Returns `RelayError::InvalidUri` classified by [`InvalidUriKind`].
pub fn parse_absolute_uri(url: &str) -> Result<Uri, RelayError> {
    let uri: Uri = url
        .parse()
        .map_err(|e: http::uri::InvalidUri| RelayError::InvalidUri {
            url: url.to_owned(),
            kind: InvalidUriKind::ParseError,
            reason: e.to_string(),
        })?;

    if uri.scheme().is_none() {
        return Err(RelayError::InvalidUri {
            url: url.to_owned(),
            kind: InvalidUriKind::MissingScheme,
            reason: "missing scheme".to_owned(),
        });
    }
    if uri.authority().is_none() {
        return Err(RelayError::InvalidUri {
            url: url.to_owned(),
            kind: InvalidUriKind::MissingAuthority,
            reason: "missing host/authority".to_owned(),
        });
    }
    Ok(uri)
}

/// Validate the gateway URL against the transport security mode.
///
/// # Errors
/// Returns `RelayError::InvalidUri` or `RelayError::InvalidScheme`.
pub fn validate_gateway_url(
    url: &str,
    transport: TransportSecurity,
) -> Result<Uri, RelayError> {
    let uri = parse_absolute_uri(url)?;
    match uri.scheme_str() {
        Some("https") => Ok(uri),
        Some("http") => match transport {
            TransportSecurity::AllowInsecureHttp => Ok(uri),
            TransportSecurity::TlsOnly => Err(RelayError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
            }),
        },
        Some(scheme) => Err(RelayError::InvalidScheme {
            scheme: scheme.to_owned(),
            reason: "only http:// and https:// schemes are supported".to_owned(),
        }),
        None => Err(RelayError::InvalidUri {
            url: url.to_owned(),
            kind: InvalidUriKind::MissingScheme,
            reason: "missing scheme".to_owned(),
        }),
    }
}

/// Raw gateway reply, before any envelope parsing.
#[derive(Debug)]
pub struct GatewayReply {
    pub status: StatusCode,
    pub body: Bytes,
    /// A non-200 body was cut at the size cap
    pub truncated: bool,
}

/// Pooled HTTP client bound to a single gateway endpoint.
///
/// Safe to share across concurrent calls; the pool is the only shared state.
#[derive(Clone, Debug)]
pub struct GatewayConnector {
    client: GatewayHttpClient,
    endpoint: Uri,
    user_agent: HeaderValue,
    max_response_size: usize,
}

impl GatewayConnector {
    /// # Errors
    /// Invalid gateway URL or user agent, or TLS setup failure.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let endpoint = validate_gateway_url(&config.gateway_url, config.transport)?;
        let user_agent = HeaderValue::from_str(&config.user_agent)?;
        let https = build_https_connector(config.tls_roots, config.transport)?;

        // pool_timer is required for pool_idle_timeout to take effect
        let mut builder = Client::builder(TokioExecutor::new());
        builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        if let Some(idle_timeout) = config.pool_idle_timeout {
            builder.pool_idle_timeout(idle_timeout);
        }

        Ok(Self {
            client: builder.build(https),
            endpoint,
            user_agent,
            max_response_size: config.max_gateway_response_size,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// POST one serialized envelope and read the whole reply.
    ///
    /// The outer status is returned as-is; judging it is the caller's job.
    /// A non-200 body past the size cap is cut to a prefix instead of
    /// failing, so the outer status always reaches the caller.
    ///
    /// # Errors
    /// Transport failures, or `RelayError::BodyTooLarge` when a 200 reply
    /// exceeds the size cap.
    pub async fn post(&self, payload: Vec<u8>) -> Result<GatewayReply, RelayError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .header(ACCEPT, APPLICATION_JSON)
            .header(USER_AGENT, self.user_agent.clone())
            .body(Full::new(Bytes::from(payload)))?;

        let response = self.client.request(request).await?;
        let status = response.status();
        let limit = self.max_response_size;

        if status != StatusCode::OK {
            let (body, truncated) = read_prefix(response.into_body(), limit).await?;
            return Ok(GatewayReply {
                status,
                body,
                truncated,
            });
        }

        let body = Limited::new(response.into_body(), limit)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    RelayError::BodyTooLarge { limit }
                } else {
                    RelayError::Transport(e)
                }
            })?
            .to_bytes();

        Ok(GatewayReply {
            status,
            body,
            truncated: false,
        })
    }
}

/// Read at most `limit` bytes of a body, dropping the rest.
///
/// Returns the prefix and whether anything was dropped.
async fn read_prefix(mut body: Incoming, limit: usize) -> Result<(Bytes, bool), RelayError> {
    let mut buf = BytesMut::new();
    while let Some(frame) = body.frame().await {
        let Ok(data) = frame?.into_data() else {
            continue;
        };
        let room = limit.saturating_sub(buf.len());
        if data.len() > room {
            buf.extend_from_slice(&data.slice(..room));
            return Ok((buf.freeze(), true));
        }
        buf.extend_from_slice(&data);
    }
    Ok((buf.freeze(), false))
}
