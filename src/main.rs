//! Kasbah harness
//!
//! Runs the `hello` scenario against a cluster: funds a key from the faucet,
//! sends the kasbah program's `hello` instruction and waits for confirmation.
//! Defaults target a local test validator.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kasbah_harness::{
    config::Config,
    ledger::{LedgerRpc, PubsubSignatureSubscriber, SignatureSubscriber, SolanaRpcLedger},
    metrics::metrics,
    scenario::{run_hello, HelloScenario},
    wallet::Wallet,
    TransactionPipeline,
};

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

    /// Argument passed to the `hello` instruction
    #[arg(long)]
    id: Option<u8>,

    /// Program id to invoke instead of the configured one
    #[arg(long, env = "KASBAH_PROGRAM_ID")]
    program_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("Loading configuration from: {}", args.config);
    let mut config = load_config(&args.config)?;
    if let Some(id) = args.id {
        config.program.hello_id = id;
    }
    if let Some(program_id) = args.program_id {
        config.program.program_id = program_id;
    }
    config.validate().context("Invalid configuration")?;

    let wallet = match &config.wallet.keypair_path {
        Some(path) => {
            info!("Loading wallet from: {}", path);
            Wallet::from_file(path).context("Failed to load wallet")?
        }
        None => Wallet::ephemeral(),
    };
    info!("Payer address: {}", wallet.pubkey());

    let ledger: Arc<dyn LedgerRpc> = Arc::new(SolanaRpcLedger::new(
        config.rpc.http_url.clone(),
        Duration::from_secs(config.rpc.timeout_secs),
        config.confirmation.commitment,
    ));

    let subscriber: Option<Arc<dyn SignatureSubscriber>> = if config.confirmation.poll_only {
        None
    } else {
        match PubsubSignatureSubscriber::connect(&config.rpc.ws_url).await {
            Ok(subscriber) => Some(Arc::new(subscriber)),
            Err(e) => {
                warn!("Websocket unavailable at {} ({}), polling only", config.rpc.ws_url, e);
                None
            }
        }
    };

    let pipeline = TransactionPipeline::from_config(ledger, subscriber, &config);
    let scenario = HelloScenario::from_config(&config)?;

    let report = run_hello(&pipeline, &wallet, &scenario)
        .await
        .context("hello scenario failed")?;

    info!(
        "Confirmed {} ({}) after {} attempt(s) in {} ms",
        report.confirmation.signature,
        report.confirmation.state,
        report.confirmation.attempts,
        report.confirmation.elapsed.as_millis()
    );
    info!("Explorer: {}", report.explorer_url);

    if config.monitoring.enable_metrics {
        info!("Metrics:\n{}", metrics().render());
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "kasbah_harness=debug,info"
    } else {
        "kasbah_harness=info,warn"
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
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["kasbah-harness", "--id", "7", "-v"]);
        assert_eq!(args.id, Some(7));
        assert!(args.verbose);
        assert_eq!(args.config, "config.toml");
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let config = load_config("/nonexistent/kasbah.toml").unwrap();
        assert!(config.validate().is_ok());
    }
}
