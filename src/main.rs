//! certdash CLI
//!
//! Drives the dashboard core from a terminal: inspect the registry, connect
//! a wallet and follow its session, or read backend data through the query
//! client.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use certdash::config::{load_config, DashboardConfig};
use certdash::lifecycle::{bootstrap, signals, DashboardContext};
use certdash::observability::logging;
use certdash::query::Fingerprint;

#[derive(Parser)]
#[command(name = "certdash")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML). Built-in defaults when omitted.
    #[arg(short, long, global = true, env = "CERTDASH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered chains
    Chains,

    /// List wallet connectors in priority order
    Connectors,

    /// Connect a wallet and follow the session until Ctrl-C
    Connect {
        /// Connector id
        connector: String,
        /// Switch to this chain once connected
        #[arg(long)]
        chain: Option<u64>,
    },

    /// Read a backend path through the query client
    Fetch {
        /// Path relative to the backend base URL
        path: String,
        /// Freshness window in seconds (config default when omitted)
        #[arg(long)]
        stale_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = DashboardConfig::default();
            certdash::config::loader::apply_env_overrides(&mut config);
            config
        }
    };
    logging::init(&config.observability);
    tracing::debug!(environment = %config.environment, "Configuration loaded");

    let ctx = bootstrap(config)?;
    let outcome = match cli.command {
        Commands::Chains => {
            cmd_chains(&ctx);
            Ok(())
        }
        Commands::Connectors => {
            cmd_connectors(&ctx);
            Ok(())
        }
        Commands::Connect { connector, chain } => cmd_connect(&ctx, &connector, chain).await,
        Commands::Fetch { path, stale_secs } => cmd_fetch(&ctx, &path, stale_secs).await,
    };

    ctx.shutdown();
    outcome
}

fn cmd_chains(ctx: &DashboardContext) {
    for chain in ctx.registry.chains() {
        let rpc = chain.primary_rpc().map(|u| u.to_string()).unwrap_or_default();
        println!("{:>10}  {:<12} {}", chain.chain_id, chain.name, rpc);
    }
}

fn cmd_connectors(ctx: &DashboardContext) {
    for connector in ctx.registry.connectors() {
        println!(
            "{:>4}  {:<20} {:<20} {}",
            connector.priority, connector.id, connector.kind, connector.provider_key
        );
    }
}

async fn cmd_connect(
    ctx: &DashboardContext,
    connector: &str,
    chain: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.session.connect(connector).await?;
    println!(
        "Connected {} on chain {}",
        session.label().unwrap_or_default(),
        session.chain_id.unwrap_or_default()
    );

    if let Some(chain_id) = chain {
        let session = ctx.session.switch_chain(chain_id).await?;
        println!("Switched to chain {}", session.chain_id.unwrap_or_default());
    }

    let mut updates = ctx.session.subscribe();
    let follow = async {
        while updates.changed().await.is_ok() {
            let session = updates.borrow_and_update().clone();
            println!(
                "{:<12} {} chain={}",
                session.status.as_str(),
                session.label().unwrap_or_else(|| "-".to_string()),
                session.chain_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
            );
        }
    };

    tokio::select! {
        _ = follow => {}
        _ = signals::termination() => {}
    }
    ctx.session.disconnect().await?;
    Ok(())
}

async fn cmd_fetch(
    ctx: &DashboardContext,
    path: &str,
    stale_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let stale_time = stale_secs.map_or(ctx.query.default_stale_time(), Duration::from_secs);
    let backend = ctx.backend.clone();
    let owned_path = path.to_string();
    let value = ctx
        .query
        .read(
            Fingerprint::new("GET", path),
            move || {
                let backend = backend.clone();
                let path = owned_path.clone();
                async move { backend.get_json(&path).await }
            },
            stale_time,
        )
        .await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
