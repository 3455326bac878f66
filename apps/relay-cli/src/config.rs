//! Layered CLI configuration.
//!
//! Precedence, lowest first: built-in defaults, the YAML file given with
//! `--config`, `RELAY__*` environment variables (nested with `__`, e.g.
//! `RELAY__GATEWAY__TIMEOUT_SECS`), `RELAY_GATEWAY_URL`, then CLI flags.

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use relay_http::{
    DEFAULT_MAX_GATEWAY_RESPONSE_SIZE, DEFAULT_USER_AGENT, RelayConfig, TlsRootConfig,
    TransportSecurity, gateway_url_from_env,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "RELAY__";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelaySettings {
    pub gateway: GatewaySettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewaySettings {
    /// Gateway endpoint; empty means not configured
    pub url: String,
    pub timeout_secs: u64,
    pub max_response_bytes: usize,
    /// Permit a plain `http://` gateway (mock gateways only)
    pub allow_insecure_http: bool,
    /// Trust the OS certificate store instead of the bundled webpki roots
    pub native_roots: bool,
    pub user_agent: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 30,
            max_response_bytes: DEFAULT_MAX_GATEWAY_RESPONSE_SIZE,
            allow_insecure_http: false,
            native_roots: false,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl RelaySettings {
    /// Load defaults, the optional YAML file, and the environment.
    ///
    /// # Errors
    /// Fails if `path` does not exist or any layer does not parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            if !path.is_file() {
                bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }

        let mut settings: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("failed to load relay configuration")?;

        if let Some(url) = gateway_url_from_env() {
            settings.gateway.url = url;
        }
        Ok(settings)
    }

    pub fn apply_cli_overrides(&mut self, gateway: Option<&str>, timeout_secs: Option<u64>) {
        if let Some(url) = gateway {
            url.trim().clone_into(&mut self.gateway.url);
        }
        if let Some(secs) = timeout_secs {
            self.gateway.timeout_secs = secs;
        }
    }

    /// # Errors
    /// Fails when no gateway URL is configured or the timeout is zero.
    pub fn to_relay_config(&self) -> Result<RelayConfig> {
        let gateway = &self.gateway;
        if gateway.url.is_empty() {
            bail!("no gateway URL configured (set gateway.url, RELAY_GATEWAY_URL or --gateway)");
        }
        if gateway.timeout_secs == 0 {
            bail!("gateway.timeout_secs must be greater than zero");
        }

        let mut config = RelayConfig::new(gateway.url.clone());
        config.request_timeout = Duration::from_secs(gateway.timeout_secs);
        config.max_gateway_response_size = gateway.max_response_bytes;
        config.user_agent.clone_from(&gateway.user_agent);
        if gateway.allow_insecure_http {
            config.transport = TransportSecurity::AllowInsecureHttp;
        }
        if gateway.native_roots {
            config.tls_roots = TlsRootConfig::Native;
        }
        Ok(config)
    }

    /// # Errors
    /// Fails if YAML serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).context("failed to render configuration as YAML")
    }
}
