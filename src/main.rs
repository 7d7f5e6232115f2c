//! Spaces Client - command line entry point
//!
//! Drives the submission engine from the terminal: cost preview, signing
//! with a local key, tracked submission with explicit retry, plus the
//! read-only `info` and `balance` queries.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![warn(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spaces_client::config::Config;
use spaces_client::tx_flow::{LocalSigner, SubmitEngine};
use spaces_client::types::{Address, AttemptState, Intent, SpaceId};
use spaces_client::{cost, endpoints, LedgerRpc, VmClient, WalletSession};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Claim an unowned space
    Claim { space: String },

    /// Send tokens to another address
    Transfer { to: String, units: u64 },

    /// Extend a space's expiry by purchasing storage-units
    Lifeline { space: String, units: u64 },

    /// Hand a space over to another owner
    Move { space: String, to: String },

    /// Write a key/value pair into a space
    Set {
        space: String,
        key: String,
        value: String,
    },

    /// Remove a key from a space
    Delete { space: String, key: String },

    /// Show the current snapshot of a space
    Info { space: String },

    /// Show the spendable balance of an address (defaults to our wallet)
    Balance { address: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let config = load_config(&args.config)?;
    let client = Arc::new(
        VmClient::new(
            config.rpc.endpoint.clone(),
            Duration::from_secs(config.rpc.timeout_secs),
        )
        .context("failed to build ledger client")?,
    );

    if config.monitoring.enable_metrics {
        let port = config.monitoring.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(port).await {
                warn!("Metrics endpoint failed: {}", e);
            }
        });
    }

    match args.command {
        Command::Info { space } => {
            let space = SpaceId::normalize(&space)?;
            match client.space_info(&space).await? {
                Some(info) => {
                    info!("📦 Space '{}'", space);
                    info!("   Owner:   {}", info.owner);
                    info!("   Units:   {}", info.units);
                    info!("   Expiry:  {}", info.expiry);
                    info!("   Created: {}", info.created);
                }
                None => info!("📦 Space '{}' is unclaimed", space),
            }
            return Ok(());
        }
        Command::Balance { address } => {
            let address = match address {
                Some(s) => Address::parse(&s)?,
                None => load_signer(&config)?.address().clone(),
            };
            let balance = client.balance(&address).await?;
            info!("💰 Balance of {}: {} units", address, balance);
            info!(
                "   Max transfer: {} units",
                cost::max_transfer_amount(balance)
            );
            return Ok(());
        }
        command => {
            let intent = build_intent(command)?;
            submit_and_wait(client, &config, intent).await?;
        }
    }

    Ok(())
}

fn build_intent(command: Command) -> Result<Intent> {
    Ok(match command {
        Command::Claim { space } => Intent::Claim {
            space: SpaceId::normalize(&space)?,
        },
        Command::Transfer { to, units } => Intent::Transfer {
            to: Address::parse(&to)?,
            units,
        },
        Command::Lifeline { space, units } => Intent::Lifeline {
            space: SpaceId::normalize(&space)?,
            units,
        },
        Command::Move { space, to } => Intent::Move {
            space: SpaceId::normalize(&space)?,
            to: Address::parse(&to)?,
        },
        Command::Set { space, key, value } => Intent::Set {
            space: SpaceId::normalize(&space)?,
            key,
            value,
        },
        Command::Delete { space, key } => Intent::Delete {
            space: SpaceId::normalize(&space)?,
            key,
        },
        Command::Info { .. } | Command::Balance { .. } => unreachable!("read-only commands"),
    })
}

/// Run one submission attempt to a terminal state
async fn submit_and_wait(
    client: Arc<VmClient>,
    config: &Config,
    intent: Intent,
) -> Result<()> {
    let signer = Arc::new(load_signer(config)?);
    let session = WalletSession::connect(signer.address().clone());
    info!("🔑 Acting as {}", session.address());

    if let Intent::Lifeline { space, units } = &intent {
        let current_units = match client.space_info(space).await? {
            Some(info) => info.units,
            None => anyhow::bail!("space '{space}' is unclaimed"),
        };
        info!(
            "⏳ Extends '{}' by roughly {}",
            space,
            cost::display_lifeline_time(*units, current_units)
        );
    }

    let engine = SubmitEngine::new(client, signer);

    match engine.preview_cost(&intent).await {
        Ok(fee) => info!("💸 Suggested total cost: {} units", fee),
        Err(e) => warn!("Fee preview unavailable: {}", e),
    }

    // Subscribe before confirming so no state change is missed
    let mut events = engine.subscribe();
    let id = engine.submit(&session, intent, None);
    info!("🚀 Attempt {} started", id);

    loop {
        let event = events.recv().await.context("event channel closed")?;
        if event.id != id {
            continue;
        }
        match event.state {
            AttemptState::Building => info!("🔧 Building transaction..."),
            AttemptState::AwaitingSignature => info!("✍️  Awaiting signature..."),
            AttemptState::Submitting => info!("📤 Submitting to the ledger..."),
            AttemptState::Done => {
                info!("✅ Transaction accepted");
                return Ok(());
            }
            AttemptState::Failed => {
                let error = event.error.unwrap_or_else(|| "unknown error".to_string());
                warn!("❌ Attempt failed: {}", error);
                anyhow::bail!("submission failed: {error}");
            }
            AttemptState::Idle => {
                info!("🚫 Signature declined, nothing was submitted");
                return Ok(());
            }
        }
    }
}

fn load_signer(config: &Config) -> Result<LocalSigner> {
    LocalSigner::from_file(&config.wallet.keypair_path)
        .with_context(|| format!("failed to load key from {}", config.wallet.keypair_path))
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "spaces_client=debug,info"
    } else {
        "spaces_client=info,warn,error"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        Ok(Config::default())
    }
}
