#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport that relays every request through a policy gateway
//!
//! [`RelayService`] is a tower service in place of a normal HTTP connector.
//! It never dials the destination. Instead it:
//! - Drains the request body and wraps method, URL, headers and body in a
//!   JSON envelope
//! - POSTs the envelope to the configured gateway (TLS via rustls, pooled)
//! - Unwraps the gateway's reply into the response the destination gave
//!
//! Two status codes are in play. A non-200 *outer* status means the gateway
//! itself refused or failed, and surfaces as [`RelayError::GatewayStatus`].
//! The *inner* status inside a 200 reply is the destination's answer and is
//! returned as an ordinary response, 4xx and 5xx included.
//!
//! Cancellation and deadlines travel with the request as a [`CallContext`]
//! extension. There is no queue and no built-in retry; compose those with
//! tower layers, using [`RelayError::is_retryable`] to classify failures.
//!
//! # Example
//!
//! ```ignore
//! use relay_http::{CallContext, RelayClient};
//! use std::time::Duration;
//!
//! let client = RelayClient::builder("https://gateway.internal/relay").build()?;
//!
//! let resp = client
//!     .get("https://api.example.com/v1/items")
//!     .header("accept", "application/json")
//!     .context(CallContext::new().timeout(Duration::from_secs(5)))
//!     .send()
//!     .await?;
//!
//! println!("destination answered {}", resp.status());
//! ```

mod auth;
mod builder;
mod client;
mod config;
mod context;
mod error;
mod gateway;
mod relay;
mod request;
mod response;
mod tls;

pub use auth::{BearerAuthLayer, BearerAuthService, StaticToken, TokenError, TokenSupplier};
pub use builder::RelayClientBuilder;
pub use client::{ClientService, RelayClient};
pub use config::{
    DEFAULT_MAX_GATEWAY_RESPONSE_SIZE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT,
    GATEWAY_URL_ENV, RelayConfig, TlsRootConfig, TransportSecurity, gateway_url_from_env,
};
pub use context::CallContext;
pub use error::{InvalidUriKind, RelayError, RelayErrorKind};
pub use relay::{RelayBody, RelayLayer, RelayService, RelayedResponse};
pub use request::RequestBuilder;
pub use response::RelayResponse;

pub use relay_envelope::{EnvelopeError, HeaderFields, InboundEnvelope, OutboundEnvelope};
