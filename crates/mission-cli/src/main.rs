use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use mission_api::MissionService;
use mission_store::{doctor as store_doctor, StoreConfig};

#[derive(Debug, Parser)]
#[command(name = "missiond", version, about = "Drone mission service")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve,
    /// Validate config, reach the store and make sure indexes exist.
    Doctor,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    server: ServerCfg,
    store: StoreConfig,
}

#[derive(Debug, serde::Deserialize)]
struct ServerCfg {
    bind: String,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    parse_config(&s)
}

fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // credentials usually live in .env next to the config
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("ignoring .env: {}", e);
        }
    }

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Serve => serve(&cfg).await?,
        Command::Doctor => doctor(&cfg).await?,
    }
    Ok(())
}

async fn serve(cfg: &Config) -> Result<()> {
    info!("serve: starting");
    store_doctor::check_config(&cfg.store)?;

    let addr: SocketAddr = cfg.server.bind.parse().with_context(|| format!("server.bind {}", cfg.server.bind))?;
    let store = mission_store::open(&cfg.store).context("open store")?;

    // An unreachable store must not keep the API down; requests will report it.
    if let Err(e) = store.ensure_indexes().await {
        warn!("serve: could not ensure indexes: {}", e);
    }

    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("bind {}", addr))?;
    mission_api::serve(listener, Arc::new(MissionService::new(store)), shutdown_signal()).await?;
    info!("serve: stopped");
    Ok(())
}

async fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    store_doctor::check_config(&cfg.store)?;
    anyhow::ensure!(cfg.server.bind.parse::<SocketAddr>().is_ok(), "server.bind is not host:port: {}", cfg.server.bind);

    let store = mission_store::open(&cfg.store).context("open store")?;
    store_doctor::check_store(store.as_ref()).await?;

    info!("doctor: OK");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("ctrl-c handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown requested");
}
