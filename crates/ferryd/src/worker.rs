//! Per-connection worker: upload, store, chunk, send, serve resends.
//!
//! Each connection is one session. A failure here aborts only this
//! session; the registry entry is removed on every exit path.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpStream;

use ferry_core::config::FerryConfig;
use ferry_core::{file_digest, split};
use ferry_transfer::{FaultPlan, FileStore, FrameStream, SendOutcome, SenderSession, SessionRegistry};

pub async fn handle_connection(
    config: Arc<FerryConfig>,
    registry: SessionRegistry,
    store: FileStore,
    socket: TcpStream,
    peer: SocketAddr,
) {
    let meta = registry.create(peer.to_string());
    let session_id = meta.session_id;

    match run_transfer(&config, &store, socket, meta).await {
        Ok(outcome) => tracing::info!(
            session_id,
            %peer,
            chunks_sent = outcome.chunks_sent,
            resends_served = outcome.resends_served,
            "session complete"
        ),
        Err(e) => tracing::warn!(session_id, %peer, error = %e, "session aborted"),
    }
    registry.remove(session_id);
}

async fn run_transfer(
    config: &FerryConfig,
    store: &FileStore,
    socket: TcpStream,
    meta: Arc<ferry_transfer::SessionMeta>,
) -> Result<SendOutcome> {
    let session_id = meta.session_id;
    let mut stream = FrameStream::new(socket, config.transfer.io_timeout());

    // Upload phase: one length-prefixed blob.
    let blob = stream
        .read_blob(config.transfer.max_upload_bytes)
        .await
        .context("upload failed")?;
    tracing::info!(session_id, bytes = blob.len(), "upload received");

    let path = store
        .write_all(&format!("upload-{session_id}"), &blob)
        .context("failed to store upload")?;
    tracing::debug!(session_id, path = %path.display(), "upload stored");

    // Echo phase: chunk, digest, send with recovery.
    let digest = file_digest(&blob);
    let chunks = split(blob, config.transfer.chunk_size)?;

    let fault = FaultPlan::random(config.fault.corrupt_percent, config.fault.drop_percent);
    if fault.is_active() {
        tracing::debug!(session_id, "fault injection active for this session");
    }

    let mut sender = SenderSession::new(session_id, chunks, digest)
        .with_faults(fault)
        .with_progress(meta);
    let outcome = sender.run(&mut stream).await?;
    Ok(outcome)
}
