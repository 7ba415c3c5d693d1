//! Filegate server
//!
//! Serves host directories over HTTP, either from a static mapping table or
//! scoped per request by signed bearer tokens.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use server::{build_router, AccessMode, AppState, ConfigResolver, Overrides};
use tracing_subscriber::EnvFilter;

/// Filegate - self-hosted virtual file manager.
#[derive(Parser, Debug)]
#[command(name = "filegate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory to serve as SRC[:VIRTUAL] (repeatable)
    #[arg(short, long = "dir", value_name = "SRC[:VIRTUAL]")]
    pub dirs: Vec<String>,

    /// Address to listen on
    #[arg(short, long, value_name = "HOST:PORT")]
    pub listen: Option<String>,

    /// Storage quota, e.g. 500MB, 10GB, 1.5TB
    #[arg(short, long)]
    pub quota: Option<String>,

    /// Shared secret for bearer tokens; enables token mode
    #[arg(long, value_name = "SECRET")]
    pub jwt_secret: Option<String>,

    /// Base directory token sessions are confined to
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            config_path: self.config.clone(),
            dirs: self.dirs.clone(),
            listen: self.listen.clone(),
            quota: self.quota.clone(),
            jwt_secret: self.jwt_secret.clone(),
            base_dir: self.base_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Filegate starting...");

    let config = ConfigResolver::new(cli.overrides()).load()?;

    match &config.mode {
        AccessMode::Static(table) => {
            tracing::info!("Static mode with {} directories", table.len());
            for mapping in table {
                tracing::info!("  {} -> {:?}", mapping.virtual_path, mapping.source);
            }
        }
        AccessMode::Token(settings) => {
            tracing::info!("Token mode with base directory {:?}", settings.base_dir);
        }
    }
    tracing::info!("Storage quota: {}", access::format_bytes(config.quota_bytes));

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    let app = build_router(Arc::new(AppState::new(config)));
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Filegate stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Failed to register signal handlers: {}", e);
                std::future::pending::<()>().await;
                return;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
}

/// Wait for Ctrl-C.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl-C");
}
