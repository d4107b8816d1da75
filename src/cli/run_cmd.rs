//! `run` and `once`: start the polling loop or execute a single cycle.

use crate::config::Config;
use anyhow::Result;
use tracing::info;

/// Poll continuously until ctrl-c. Shutdown drains the current cycle.
pub async fn run(cfg: Config) -> Result<()> {
    let watcher = super::build_watcher(cfg)?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received, draining current cycle");
            let _ = shutdown_tx.send(true);
        }
    });

    watcher.run(shutdown_rx).await;
    Ok(())
}

/// Execute exactly one poll cycle and exit.
pub async fn once(cfg: Config) -> Result<()> {
    let watcher = super::build_watcher(cfg)?;
    watcher.run_cycle().await;
    Ok(())
}
