mod abi;
mod config;
mod http;
mod minter;
mod models;
mod queue;
mod rpc;
mod state;

use std::sync::Arc;

use crate::config::MintApiConfig;
use crate::minter::Minter;
use crate::queue::MintQueue;
use crate::rpc::ChainClient;
use crate::state::{ApiCache, AppState};
use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = MintApiConfig::load().context("Failed to load configuration")?;

    let chain = ChainClient::new(
        &config.chain.rpc_url,
        &config.chain.contract_address,
        config.chain.request_timeout(),
    )
    .context("Failed to initialize RPC client")?;

    let minter = Minter::from_config(chain.clone(), &config.chain);
    let max_mint_per_tx = minter.max_mint_per_tx();
    let queue = MintQueue::new(minter, config.queue.clone());
    info!(
        "Mint queue ready: capacity {}, {}ms between mints",
        config.queue.max_queue_size, config.queue.delay_between_mints_ms
    );

    let cache = Arc::new(ApiCache::new(&config.cache));
    let app_state = AppState::new(
        queue,
        chain,
        cache,
        max_mint_per_tx,
        config.server.mint_wait_timeout(),
    );

    let listener = TcpListener::bind(config.server.address())
        .await
        .context("Failed to bind HTTP listener")?;
    let local_addr = listener
        .local_addr()
        .context("Failed to obtain listener address")?;
    info!("Uniko mint API listening on {local_addr}");

    let router: Router = http::router(app_state.clone());
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server exited with error")?;

    let status = app_state.queue.status();
    if status.processing || status.queue_length > 0 {
        info!(
            "Shutting down with {} queued mint requests discarded",
            status.queue_length
        );
    }

    Ok(())
}

fn init_tracing() {
    let default_filter = "info";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    assert!(!filter.is_empty(), "Tracing filter must not be empty");
    assert!(filter.len() < 256, "Tracing filter length exceeds bounds");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Shutdown signal received");
}
