//! `chaintap watch` — long-running polling of every configured contract,
//! running until `SIGINT`/`SIGTERM`.

use std::sync::Arc;

use chaintap_core::config::Config;
use chaintap_core::ChaintapError;
use chaintap_indexer::Coordinator;
use tokio::sync::watch;
use tracing::info;

use crate::wiring::Components;

pub async fn run(config: Config, components: Components) -> Result<(), ChaintapError> {
    let (stop_tx, stop_rx) = watch::channel(false);
    let chain_id = config.chain.chain_id();

    let mut handles = Vec::with_capacity(config.contracts.len());
    for contract in config.contracts.clone() {
        let mut coordinator = Coordinator::new(
            chain_id,
            contract,
            config.options.clone(),
            Arc::clone(&components.pool),
            Arc::clone(&components.registry),
            Arc::clone(&components.storage),
            Arc::clone(&components.fetcher),
            stop_rx.clone(),
        );
        handles.push(tokio::spawn(async move { coordinator.run().await }));
    }

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping pollers");
    let _ = stop_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
