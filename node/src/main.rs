// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Coffer Vault Node
//!
//! Entry point for the `coffer-node` binary. Parses CLI arguments, initializes
//! logging and metrics, deploys the configured vault behind a dispatch
//! router, and serves the HTTP/WS API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     - deploy the vault and serve it
//! - `address` - print the vault's deterministic deployment address
//! - `version` - print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, RwLock};

use coffer_contracts::factory::{deployment_address, parse_seed};

use cli::{Commands, CofferNodeCli};
use config::NodeConfig;
use metrics::NodeMetrics;

/// Broadcast channel capacity for live event streaming.
/// 256 is large enough to absorb short bursts without dropping events
/// for connected WebSocket clients.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CofferNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Address(args) => print_address(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Deploys the vault and serves the API and metrics until shutdown.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(args.log_level, args.log_format)
        .context("failed to install the tracing subscriber")?;

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        config = ?args.config,
        "starting coffer-node"
    );
    tracing::warn!("rpc callers are not authenticated; serve on a trusted network only");

    let node_config = NodeConfig::load(args.config.as_deref())?;

    // --- Vault ---
    let (deployments, vault) = api::deploy_vault(&node_config)?;

    // --- Metrics ---
    let node_metrics =
        Arc::new(NodeMetrics::new().context("failed to register prometheus metrics")?);

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        vault,
        deployments: Arc::new(RwLock::new(deployments)),
        event_tx,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("coffer-node stopped");
    Ok(())
}

/// Prints where the configured vault would be deployed, without deploying.
fn print_address(args: cli::AddressArgs) -> Result<()> {
    let node_config = NodeConfig::load(args.config.as_deref())?;
    let deployer = args.deployer.unwrap_or_else(|| node_config.deployer());
    let seed = match args.seed.as_deref() {
        Some(text) => parse_seed(text).map_err(anyhow::Error::msg)?,
        None => node_config.seed()?,
    };
    let digest = node_config.vault.code_digest()?;

    println!("{}", deployment_address(deployer, &seed, &digest));
    println!("  deployer    : {}", deployer);
    println!("  seed        : 0x{}", hex::encode(seed));
    println!("  code digest : 0x{}", hex::encode(digest));
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("coffer-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that signal is never delivered and the other still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
