//! ISO 8583 front-end client entry point

use anyhow::{bail, Context, Result};
use authorizer::{
    connection_manager, init_tracing, validate, AuthorizationFields, Dispatcher, TracingSink,
};
use clap::{Args, Parser, Subcommand};
use client_config::ClientConfig;
use network::ConnectionManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "ISO 8583 client for the FE1/FE2 front ends", long_about = None)]
struct Cli {
    /// Configuration file path (TOML); ISOCLIENT__* variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep both links signed on until Ctrl-C, then sign off
    Run,
    /// Send one authorization request and report the answer
    Authorize(AuthorizeArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug)]
struct AuthorizeArgs {
    /// Primary account number (field 2)
    #[arg(long)]
    pan: String,

    /// Processing code (field 3)
    #[arg(long, default_value = "000000")]
    processing_code: String,

    /// Amount in minor units (field 4)
    #[arg(long)]
    amount: String,

    /// Transmission date/time MMDDhhmmss (field 7)
    #[arg(long)]
    date_time: String,

    /// System trace audit number (field 11)
    #[arg(long)]
    stan: String,

    /// Expiry YYMM (field 14)
    #[arg(long)]
    expiry: String,

    /// Track 2 data (field 35)
    #[arg(long)]
    track2: String,

    /// Retrieval reference number (field 37)
    #[arg(long)]
    reference: String,

    /// Seconds to wait for a signed-on front end
    #[arg(long, default_value_t = 30)]
    wait_secs: u64,
}

impl AuthorizeArgs {
    fn fields(&self) -> AuthorizationFields {
        AuthorizationFields {
            pan: self.pan.clone(),
            processing_code: self.processing_code.clone(),
            amount: self.amount.clone(),
            transmission_date_time: self.date_time.clone(),
            stan: self.stan.clone(),
            expiry: self.expiry.clone(),
            track2: self.track2.clone(),
            reference: self.reference.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ClientConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Command::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    init_tracing(&config.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        fe1 = %config.endpoints.fe1.address(),
        fe2 = %config.endpoints.fe2.address(),
        "Starting ISO 8583 client"
    );

    match cli.command {
        Command::Run => run(&config).await,
        Command::Authorize(args) => authorize(&config, &args).await,
        Command::Config => Ok(()),
    }
}

async fn run(config: &ClientConfig) -> Result<()> {
    let manager = connection_manager(config);
    manager.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown signal received");

    manager.exit().await;
    Ok(())
}

async fn authorize(config: &ClientConfig, args: &AuthorizeArgs) -> Result<()> {
    let fields = args.fields();
    validate(&fields).context("Request rejected before sending")?;

    let manager = connection_manager(config);
    manager.start();

    let result = send_once(&manager, config, &fields, Duration::from_secs(args.wait_secs)).await;
    manager.exit().await;
    let outcome = result?;

    println!(
        "{} answered {} with response code {}",
        outcome.endpoint,
        outcome.response.mti(),
        outcome.response_code().unwrap_or("none")
    );
    if !outcome.is_approved() {
        bail!(
            "Authorization declined by {} (response code {})",
            outcome.endpoint,
            outcome.response_code().unwrap_or("none")
        );
    }
    Ok(())
}

async fn send_once(
    manager: &ConnectionManager,
    config: &ClientConfig,
    fields: &AuthorizationFields,
    wait: Duration,
) -> Result<authorizer::SendOutcome> {
    let Some(label) = manager.wait_until_any_signed_on(wait).await else {
        warn!(wait_secs = wait.as_secs(), "No front end signed on");
        bail!("No front end signed on within {}s", wait.as_secs());
    };
    info!(endpoint = %label, "Front end ready");

    let dispatcher = Dispatcher::new(manager.clone(), config.timing.response_timeout())
        .with_sink(Arc::new(TracingSink));
    let outcome = dispatcher
        .send_fields(fields)
        .await
        .context("Authorization failed")?;
    Ok(outcome)
}
