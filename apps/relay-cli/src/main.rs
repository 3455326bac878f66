mod config;
mod logging;
mod send;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::RelaySettings;
use relay_http::RelayService;
use std::path::PathBuf;
use std::process::ExitCode;

/// Relay CLI - send HTTP requests through a policy gateway
#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Send HTTP requests through a policy gateway relay")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Gateway URL override (overrides config and environment)
    #[arg(long, global = true)]
    gateway: Option<String>,

    /// Gateway timeout override, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay one request and print the destination's response
    Send(send::SendArgs),
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let mut settings = RelaySettings::load(cli.config.as_deref())?;
    settings.apply_cli_overrides(cli.gateway.as_deref(), cli.timeout_secs);

    if cli.print_config {
        print!("{}", settings.to_yaml()?);
        return Ok(ExitCode::SUCCESS);
    }

    // Default: check
    match cli.command.unwrap_or(Commands::Check) {
        Commands::Send(args) => args.run(&settings).await,
        Commands::Check => check_config(&settings),
    }
}

fn check_config(settings: &RelaySettings) -> Result<ExitCode> {
    tracing::info!("checking configuration");
    let config = settings.to_relay_config()?;
    let relay = RelayService::new(&config).context("invalid relay configuration")?;
    tracing::info!(gateway = %relay.gateway_url(), "relay configuration is valid");

    println!("Configuration is valid");
    print!("{}", settings.to_yaml()?);
    Ok(ExitCode::SUCCESS)
}
