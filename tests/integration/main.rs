//! Ferry integration test harness.
//!
//! Tests run a real accept loop on a loopback port, speaking the full
//! wire protocol over TCP, and drive it with an in-process client. No
//! external processes or privileges required.
//!
//!   cargo test --test integration

mod concurrent;
mod failures;
mod recovery;
mod transfer;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};

use ferry_core::{file_digest, split};
use ferry_transfer::{
    FaultPlan, FrameStream, ReceiverOutcome, ReceiverSession, SenderSession, SessionRegistry,
};

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_UPLOAD: u64 = 64 * 1024 * 1024;

// ── Harness ───────────────────────────────────────────────────────────────────

/// A loopback server running the ferryd connection flow: length-prefixed
/// upload in, chunked echo with resend service out.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: SessionRegistry,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Spawn the server. `fault` builds the injection plan for each new
    /// session; faults apply to the initial pass only.
    pub async fn spawn(chunk_size: usize, fault: fn(u32) -> FaultPlan) -> Result<TestServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let registry = SessionRegistry::new();

        let accept_registry = registry.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((socket, peer)) = listener.accept().await else {
                    break;
                };
                let registry = accept_registry.clone();
                tokio::spawn(async move {
                    let meta = registry.create(peer.to_string());
                    let session_id = meta.session_id;
                    let result = serve_one(socket, session_id, chunk_size, fault(session_id)).await;
                    registry.remove(session_id);
                    if let Err(e) = result {
                        eprintln!("session {session_id} aborted: {e}");
                    }
                });
            }
        });

        Ok(TestServer {
            addr,
            registry,
            handle,
        })
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_one(
    socket: TcpStream,
    session_id: u32,
    chunk_size: usize,
    fault: FaultPlan,
) -> Result<()> {
    let mut stream = FrameStream::new(socket, IO_TIMEOUT);
    let blob = stream.read_blob(MAX_UPLOAD).await?;
    let digest = file_digest(&blob);
    let chunks = split(blob, chunk_size)?;
    let mut sender = SenderSession::new(session_id, chunks, digest).with_faults(fault);
    sender.run(&mut stream).await?;
    Ok(())
}

/// Upload `data` and receive it back through the full protocol.
pub async fn round_trip(addr: SocketAddr, data: Bytes) -> Result<ReceiverOutcome> {
    let socket = TcpStream::connect(addr).await?;
    let mut stream = FrameStream::new(socket, IO_TIMEOUT);
    stream.write_blob(&data).await?;
    let receiver = ReceiverSession::new(3);
    let outcome = receiver.run(&mut stream).await?;
    stream.shutdown().await.ok();
    Ok(outcome)
}

/// Deterministic non-repeating test data.
pub fn patterned(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i * 31 % 251) as u8).collect::<Vec<u8>>())
}
