//! Tandem CLI - run the collision-avoidance controller against a local arena

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tandem_core::prelude::*;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Two-turtle collision-avoidance controller", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller with the local arena until Ctrl-C
    Run {
        /// Configuration file read instead of tandem.toml and TANDEM_CONFIG_PATH;
        /// TANDEM_* variables still apply
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Seed for the steering random source
        #[arg(long)]
        seed: Option<u64>,
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Print the effective configuration as JSON
    Config {
        /// Configuration file read instead of tandem.toml and TANDEM_CONFIG_PATH
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Version information
    Version,
}

fn load_config(path: Option<PathBuf>) -> Result<TandemConfig> {
    let config = match path {
        Some(path) => TandemConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TandemConfig::load()?,
    };
    Ok(config)
}

async fn run(mut config: TandemConfig) -> Result<()> {
    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
        }
        ctrl_c.cancel();
    });

    // logged so a run can be replayed with --seed
    if config.seed.is_none() {
        config.seed = Some(rand::random::<u64>());
    }
    tracing::info!(seed = config.seed, node = %config.node_name, "starting");

    let bus = LocalBus::with_queue_depth("tandem", config.bus.queue_depth);
    let arena = LocalArena::start(
        Arc::new(bus.named("turtlesim")),
        config.arena.clone(),
        &config.agents.primary,
        shutdown.clone(),
    )
    .await
    .context("starting arena")?;

    let stats = run_node(Arc::new(bus.named(&config.node_name)), &config, shutdown.clone()).await?;
    arena.stop();

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("tandem {}", env!("CARGO_PKG_VERSION"));
            println!("tandem-core {}", tandem_core::VERSION);
        }
        Commands::Config { config } => {
            let config = load_config(config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Run { config, seed, ticks } => {
            let mut config = load_config(config)?;
            if seed.is_some() {
                config.seed = seed;
            }
            if ticks.is_some() {
                config.control.max_ticks = ticks;
            }
            run(config).await?;
        }
    }

    Ok(())
}
