use crate::config::RelaySettings;
use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::Args;
use http::Method;
use relay_http::{CallContext, RelayClientBuilder, RelayResponse, StaticToken};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// curl's exit status for an HTTP error with `--fail`
const EXIT_HTTP_ERROR: u8 = 22;

/// Send one request through the gateway
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination URL (absolute)
    #[arg(long)]
    url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    headers: Vec<String>,

    /// Request body
    #[arg(short, long, conflicts_with = "data_file")]
    data: Option<String>,

    /// Read the request body from a file
    #[arg(long, value_name = "PATH")]
    data_file: Option<PathBuf>,

    /// Bearer token added when no Authorization header is given
    #[arg(long)]
    bearer_token: Option<String>,

    /// Print the inner status line and headers before the body
    #[arg(short, long)]
    include: bool,

    /// Exit with status 22 when the destination answers 4xx or 5xx
    #[arg(long)]
    fail: bool,
}

/// Split a `Name: value` header argument.
fn parse_header(raw: &str) -> Result<(&str, &str)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("invalid header {raw:?}: expected \"Name: value\"");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("invalid header {raw:?}: empty name");
    }
    Ok((name, value.trim()))
}

fn parse_method(raw: &str) -> Result<Method> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method {raw:?}"))
}

impl SendArgs {
    async fn body(&self) -> Result<Bytes> {
        if let Some(data) = &self.data {
            return Ok(Bytes::from(data.clone()));
        }
        match &self.data_file {
            Some(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .with_context(|| format!("failed to read {}", path.display())),
            None => Ok(Bytes::new()),
        }
    }

    pub async fn run(self, settings: &RelaySettings) -> Result<ExitCode> {
        let method = parse_method(&self.method)?;
        let body = self.body().await?;

        let mut builder = RelayClientBuilder::with_config(settings.to_relay_config()?);
        if let Some(token) = &self.bearer_token {
            builder = builder.with_token_supplier(StaticToken::new(token.as_str()));
        }
        let client = builder.build().context("failed to set up the relay")?;

        let mut request = client.request(method, &self.url).body_bytes(body);
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            request = request.header(name, value);
        }

        // Ctrl-C aborts the in-flight gateway call.
        let ctx = CallContext::new();
        let interrupt = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.cancel();
            }
        });

        let response = request
            .context(ctx)
            .send()
            .await
            .context("relay call failed")?;

        let status = response.status();
        tracing::info!(
            status = status.as_u16(),
            body_fallback = response.is_body_fallback(),
            "destination answered"
        );

        self.print(response).await?;

        if self.fail && (status.is_client_error() || status.is_server_error()) {
            return Ok(ExitCode::from(EXIT_HTTP_ERROR));
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn print(&self, response: RelayResponse) -> Result<()> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await;

        let mut out = std::io::stdout().lock();
        if self.include {
            writeln!(out, "{status}")?;
            for (name, value) in &headers {
                writeln!(out, "{name}: {}", String::from_utf8_lossy(value.as_bytes()))?;
            }
            writeln!(out)?;
        }
        out.write_all(&body)?;
        out.flush()?;
        Ok(())
    }
}
