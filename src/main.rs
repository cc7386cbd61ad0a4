//! Whalewatch - Multi-Chain Whale Transfer Ingestion Pipeline
//!
//! Watches EVM chains through their block explorer APIs and persists
//! deduplicated whale transfer events.

mod adapters;
mod application;
mod config;
mod domain;
mod ports;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use crate::adapters::price::{CachedPriceFeed, PriceFeedConfig};
use crate::adapters::store::MemoryEventStore;
use crate::application::CollectorManager;
use crate::config::{load_config, Config};
use crate::domain::chain::Chain;

/// Whalewatch - multi-chain whale transfer watcher
#[derive(Parser, Debug)]
#[command(
    name = "whalewatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Multi-chain whale transfer ingestion pipeline",
    long_about = "Whalewatch polls block explorer APIs for native and token transfers \
                  crossing a USD threshold, attributes counterparties against a \
                  known-exchange directory and persists deduplicated whale events."
)]
struct CliApp {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the collector fleet
    Run(RunCmd),

    /// Validate the configuration and report credential status
    Check(CheckCmd),
}

#[derive(Parser, Debug)]
struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct CheckCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (API keys go here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    match app.command {
        Command::Run(cmd) => {
            let config = load_config_expanded(&cmd.config)?;
            init_logging(app.verbose, app.debug, &config.logging.level);
            run_command(config).await
        }
        Command::Check(cmd) => {
            let config = load_config_expanded(&cmd.config)?;
            init_logging(app.verbose, app.debug, &config.logging.level);
            check_command(config)
        }
    }
}

fn load_config_expanded(path: &PathBuf) -> Result<Config> {
    let expanded = shellexpand::tilde(&path.display().to_string()).to_string();
    load_config(&expanded).with_context(|| format!("Failed to load configuration from {}", expanded))
}

fn init_logging(verbose: bool, debug: bool, config_level: &str) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new(config_level.to_string())
    };
    fmt().with_env_filter(filter).init();
}

async fn run_command(config: Config) -> Result<()> {
    tracing::info!("Starting whalewatch collector fleet...");

    let store = Arc::new(MemoryEventStore::new());
    let prices = Arc::new(CachedPriceFeed::new(PriceFeedConfig {
        api_url: config.price.api_url.clone(),
        refresh_interval: Duration::from_secs(config.price.refresh_interval_secs),
        timeout: Duration::from_secs(10),
    }));

    let manager = CollectorManager::new(config, store, prices);
    let started = manager.init_from_config().await;
    if started == 0 {
        bail!(
            "No collectors started. Set an explorer API key in config.toml or the \
             environment (ETHERSCAN_API_KEY, BSCSCAN_API_KEY, POLYGONSCAN_API_KEY)."
        );
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, stopping collectors...");
    manager.stop_all().await;

    Ok(())
}

fn check_command(config: Config) -> Result<()> {
    println!("Configuration OK");
    println!(
        "Budget: {} calls/day, {} reserved for live detection",
        config.budget.daily_limit, config.budget.safety_buffer
    );
    println!(
        "Backfill: {} (intensive hour {:02}:00 UTC, target block {})",
        if config.backfill.enabled { "enabled" } else { "disabled" },
        config.backfill.intensive_hour,
        config.backfill.target_block
    );

    for &chain in Chain::ALL {
        let section = config.chain_section(chain);
        let status = if !section.enabled {
            "disabled".to_string()
        } else if section.resolve_api_key(chain).is_some() {
            "ready".to_string()
        } else {
            format!("missing credential ({})", chain.descriptor().credential_env)
        };
        println!("  {:<10} {}", chain.id(), status);
    }

    Ok(())
}
