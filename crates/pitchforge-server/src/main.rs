//! Pitchforge service entry point.

use pitchforge_config::load_config;
use pitchforge_core::AttemptObserver;
use pitchforge_fallback::{ChainEntry, FallbackChain};
use pitchforge_monitor::{init_logging, Monitor};
use pitchforge_providers::build_chain;
use pitchforge_resilience::{RateLimiter, RetryPolicy};
use pitchforge_server::{AppState, Server};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("pitchforge failed to start: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config().await?;
    init_logging(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Pitchforge");

    let monitor = Arc::new(Monitor::new(config.monitoring.clone()));
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

    let entries: Vec<ChainEntry> = build_chain(&config.providers)?
        .into_iter()
        .map(|(chain_config, provider)| ChainEntry::new(chain_config, provider))
        .collect();

    let chain = FallbackChain::new(entries, RetryPolicy::new(config.retry.clone()))
        .with_observer(Arc::clone(&monitor) as Arc<dyn AttemptObserver>);

    let addr = config.server.socket_addr();
    let shutdown = CancellationToken::new();

    let state = AppState::builder()
        .config(config)
        .chain(chain)
        .limiter(Arc::clone(&limiter))
        .monitor(Arc::clone(&monitor))
        .shutdown(shutdown)
        .build();

    Server::new(addr, state)
        .with_background_task(limiter.spawn_sweeper())
        .with_background_task(monitor.spawn_health_sweep())
        .run()
        .await?;

    Ok(())
}
