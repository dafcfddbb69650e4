//! Summoner Exchange Node - Main Binary
//!
//! Loads the deployment parameters of an exchange, validates them and
//! replays trade scenarios against in-memory identity and resource
//! ledgers.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

mod config;
mod scenario;

use config::NodeConfig;
use scenario::Scenario;

/// Summoner Exchange CLI
#[derive(Parser)]
#[command(name = "summoner-node")]
#[command(about = "Summoner Exchange - escrow trades between resources and gold")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "summoner.toml", env = "SUMMONER_CONFIG")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Validate the configuration and print the deployment parameters
    Check,

    /// Replay a scenario file, printing step results and events as JSON lines
    Simulate {
        /// Scenario TOML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Continue past failed steps
        #[arg(long)]
        keep_going: bool,
    },

    /// Show version
    Version,
}

fn init_logging(config: &NodeConfig, verbose: bool) {
    let log_level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},summoner_exchange={}", log_level, log_level).into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        println!("Summoner Exchange v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration
    let config = NodeConfig::load(&cli.config)?;
    init_logging(&config, cli.verbose);
    info!("Loaded configuration from {:?}", cli.config);

    config.validate()?;

    match cli.command {
        Command::Check => {
            let exchange = &config.exchange;
            println!("operator           {}", exchange.operator);
            println!("identity registry  {}", exchange.identity_registry);
            println!("min identity tier  {}", exchange.min_identity_tier);
            println!("gold               {}", exchange.gold);
            Ok(())
        }
        Command::Simulate {
            scenario: path,
            keep_going,
        } => {
            let loaded = Scenario::load(&path)?;
            let mut stdout = std::io::stdout().lock();
            let outcome = scenario::run(&config.exchange, &loaded, keep_going, &mut stdout).await?;

            info!(
                steps = outcome.steps_run,
                events = outcome.events,
                failures = outcome.failures.len(),
                "scenario finished"
            );
            if let Some((step, reason)) = outcome.failures.first() {
                error!(step, %reason, "scenario failed");
                anyhow::bail!("{} step(s) failed, first at step {}", outcome.failures.len(), step);
            }
            Ok(())
        }
        Command::Version => Ok(()),
    }
}
