//! Ribbon propagator CLI.
//!
//! # Commands
//!
//! ```text
//! describe  --config <file>              print the rule chain built from a config
//! select    --config <file> [--count N]  run selections against the configured servers
//! watch     --config <file>              reload the rule whenever the file changes
//! propagate --key <k> --value <v>        hop a context entry across a worker pool
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use ribbon_propagator::config::{load_config, ConfigWatcher, RibbonConfig};
use ribbon_propagator::context;
use ribbon_propagator::executor::{AsyncExecutor, Propagator, WorkerPool};
use ribbon_propagator::load_balancer::Balancer;
use ribbon_propagator::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "ribbon-propagator")]
#[command(about = "Context propagation and predicate based server selection", long_about = None)]
struct Cli {
    /// Override the configured log level.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the selection rule built from a config file
    Describe {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run selections against the configured servers
    Select {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Load balancer key handed to the predicates.
        #[arg(short, long)]
        key: Option<String>,

        /// Print the selections as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the rule whenever the config file changes
    Watch {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Set a context entry and read it back from a worker thread
    Propagate {
        #[arg(short, long)]
        key: String,

        #[arg(short, long)]
        value: String,
    },
}

#[derive(Serialize)]
struct Selection {
    rule: String,
    description: String,
    picks: Vec<Pick>,
}

#[derive(Serialize)]
struct Pick {
    id: String,
    address: String,
    zone: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Describe { config } => {
            let config = load(&config, cli.log_level.as_deref())?;
            let balancer = Balancer::from_config(&config);
            let rule = balancer.rule();
            println!("{}: {}", rule.name(), rule.description());
        }
        Commands::Select {
            config,
            count,
            key,
            json,
        } => {
            let config = load(&config, cli.log_level.as_deref())?;
            let balancer = Balancer::from_config(&config);
            let rule = balancer.rule();

            let picks: Vec<Pick> = (0..count)
                .filter_map(|_| balancer.choose(key.as_deref()))
                .map(|server| Pick {
                    id: server.id.clone(),
                    address: server.addr.to_string(),
                    zone: server.zone().map(str::to_string),
                })
                .collect();

            if json {
                let selection = Selection {
                    rule: rule.name().to_string(),
                    description: rule.description().to_string(),
                    picks,
                };
                println!("{}", serde_json::to_string_pretty(&selection)?);
            } else if picks.is_empty() {
                println!("no server selectable");
            } else {
                for pick in picks {
                    println!("{}\t{}\t{}", pick.id, pick.address, pick.zone.as_deref().unwrap_or("-"));
                }
            }
        }
        Commands::Watch { config: path } => {
            let config = load(&path, cli.log_level.as_deref())?;
            let balancer = Arc::new(Balancer::from_config(&config));
            tracing::info!(rule = %balancer.rule().description(), "Initial rule");

            let (watcher, updates) = ConfigWatcher::new(&path);
            let _watcher = watcher.run()?;
            let task = balancer.clone().watch(updates);

            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutdown signal received");
            task.abort();
        }
        Commands::Propagate { key, value } => {
            logging::init_logging(&Default::default(), cli.log_level.as_deref());

            let pool = WorkerPool::from_current("propagate")?;
            let propagator = Propagator::new(pool);

            context::put(key.clone(), value);
            tracing::info!(context = %context::current(), "Submitting from caller thread");

            let lookup = key.clone();
            let seen = propagator
                .submit_callable(move || {
                    let seen = context::get(&lookup);
                    tracing::info!(context = %context::current(), "Running on worker thread");
                    seen
                })?
                .await?;
            context::remove();

            println!("{} = {}", key, seen.as_deref().unwrap_or("<missing>"));
        }
    }

    Ok(())
}

/// Load a config file and set up logging and metrics from it.
fn load(path: &Path, log_level: Option<&str>) -> Result<RibbonConfig, Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    logging::init_logging(&config.observability, log_level);

    tracing::info!(
        client = %config.client.name,
        zone = config.client.zone.as_deref().unwrap_or("-"),
        servers = config.servers.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }
    Ok(config)
}
