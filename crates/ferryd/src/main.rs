//! ferryd — Ferry file transfer daemon.
//!
//! Accepts TCP connections, receives one uploaded file per connection,
//! then echoes it back as verified chunks with retransmission on demand.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use ferry_core::config::FerryConfig;
use ferry_transfer::{FileStore, SessionRegistry};

mod worker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = FerryConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = FerryConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        FerryConfig::default()
    });
    config.validate().context("invalid configuration")?;
    let config = Arc::new(config);

    let store = FileStore::new(&config.transfer.storage_path)?;
    tracing::info!(path = %store.root().display(), "file store ready");

    if config.fault.corrupt_percent > 0 || config.fault.drop_percent > 0 {
        tracing::warn!(
            corrupt_percent = config.fault.corrupt_percent,
            drop_percent = config.fault.drop_percent,
            "fault injection enabled — transfers will exercise recovery"
        );
    }

    let registry = SessionRegistry::new();

    let bind = format!("{}:{}", config.network.listen_addr, config.network.port);
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(addr = %listener.local_addr()?, "ferryd listening");

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let accept_task = {
        let config = config.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            loop {
                let (socket, peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                tracing::info!(%peer, "connection accepted");
                tokio::spawn(worker::handle_connection(
                    config.clone(),
                    registry.clone(),
                    store.clone(),
                    socket,
                    peer,
                ));
            }
        })
    };

    let session_printer = {
        let registry = registry.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            loop {
                interval.tick().await;
                tracing::info!(count = registry.len(), "session table snapshot");
                for session in registry.snapshot() {
                    tracing::info!(
                        session_id = session.session_id,
                        peer = %session.peer_addr,
                        chunks_sent = session.chunks_sent.load(std::sync::atomic::Ordering::Relaxed),
                        resends_served = session.resends_served.load(std::sync::atomic::Ordering::Relaxed),
                        "  session"
                    );
                }
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = accept_task        => tracing::error!("accept loop exited: {:?}", r),
        r = session_printer    => tracing::error!("session printer exited: {:?}", r),
    }

    Ok(())
}
