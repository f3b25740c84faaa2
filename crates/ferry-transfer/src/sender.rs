//! Sender state machine — drives one transfer: metadata handshake, a full
//! ascending-sequence pass over the chunk set, then retransmission service
//! until the peer closes.
//!
//! The chunk set is immutable and doubles as the retransmission cache: a
//! resend re-encodes exactly the requested chunk, never a range. Chunks are
//! written strictly in sequence; nothing is sent concurrently with itself.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use ferry_core::chunk::ChunkSet;
use ferry_core::digest::FILE_DIGEST_LEN;
use ferry_core::error::{ProtocolError, TransferError};
use ferry_core::wire::{Frame, FrameError, TransferMeta};

use crate::fault::{FaultAction, FaultPlan};
use crate::session::SessionMeta;
use crate::stream::FrameStream;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Created, metadata not yet on the wire.
    AwaitingMetadata,
    /// Initial pass in progress; `cursor` is the sequence being sent.
    Sending { cursor: u32 },
    /// Full pass done, serving retransmission requests.
    AwaitingResend,
    /// Peer closed cleanly; the session is over.
    Closed,
    /// Unrecoverable failure; only this session is affected.
    Aborted,
}

/// Counters from a completed send.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOutcome {
    pub chunks_sent: u32,
    pub chunks_dropped: u32,
    pub resends_served: u32,
}

pub struct SenderSession {
    session_id: u32,
    chunks: ChunkSet,
    file_digest: [u8; FILE_DIGEST_LEN],
    fault: FaultPlan,
    progress: Option<Arc<SessionMeta>>,
    state: SenderState,
}

impl SenderSession {
    pub fn new(session_id: u32, chunks: ChunkSet, file_digest: [u8; FILE_DIGEST_LEN]) -> Self {
        Self {
            session_id,
            chunks,
            file_digest,
            fault: FaultPlan::none(),
            progress: None,
            state: SenderState::AwaitingMetadata,
        }
    }

    /// Inject faults on the initial pass. Retransmissions are never faulted.
    pub fn with_faults(mut self, fault: FaultPlan) -> Self {
        self.fault = fault;
        self
    }

    /// Mirror progress counters into the registry entry for this session,
    /// so the status logger sees live numbers.
    pub fn with_progress(mut self, meta: Arc<SessionMeta>) -> Self {
        self.progress = Some(meta);
        self
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Run the session to completion. On error the state is `Aborted` and
    /// only this session is affected.
    pub async fn run<S>(
        &mut self,
        stream: &mut FrameStream<S>,
    ) -> Result<SendOutcome, TransferError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.drive(stream).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.state = SenderState::Aborted;
                Err(e)
            }
        }
    }

    async fn drive<S>(&mut self, stream: &mut FrameStream<S>) -> Result<SendOutcome, TransferError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let meta = TransferMeta {
            session_id: self.session_id,
            total_chunks: self.chunks.total_chunks(),
            file_len: self.chunks.total_bytes(),
            file_digest: self.file_digest,
        };
        stream.write_meta(&meta).await?;
        tracing::debug!(
            session_id = self.session_id,
            total_chunks = meta.total_chunks,
            file_len = meta.file_len,
            "metadata sent"
        );

        let mut outcome = SendOutcome::default();

        for seq_num in 0..self.chunks.total_chunks() {
            self.state = SenderState::Sending { cursor: seq_num };
            let payload = match self.chunks.get(seq_num) {
                Some(chunk) => chunk.payload.clone(),
                None => break,
            };

            match self.fault.decide(seq_num) {
                FaultAction::Deliver => {
                    stream
                        .write_frame(&Frame::data(self.session_id, seq_num, payload))
                        .await?;
                }
                FaultAction::Corrupt => {
                    // Original digest over a flipped payload: the receiver
                    // must detect the mismatch and re-request.
                    let mut frame = Frame::data(self.session_id, seq_num, payload);
                    frame.payload = FaultPlan::corrupt(&frame.payload);
                    tracing::debug!(seq_num, "fault injection: corrupting chunk");
                    stream.write_frame(&frame).await?;
                }
                FaultAction::Drop => {
                    tracing::debug!(seq_num, "fault injection: dropping chunk");
                    outcome.chunks_dropped += 1;
                    continue;
                }
            }
            outcome.chunks_sent += 1;
            if let Some(progress) = &self.progress {
                progress.record_chunk_sent();
            }
        }

        stream
            .write_frame(&Frame::end_of_transmission(self.session_id))
            .await?;
        self.state = SenderState::AwaitingResend;
        tracing::debug!(
            session_id = self.session_id,
            sent = outcome.chunks_sent,
            "initial pass complete, serving retransmissions"
        );

        loop {
            match stream.read_resend().await? {
                None => {
                    self.state = SenderState::Closed;
                    break;
                }
                Some(request) => {
                    if request.session_id != self.session_id {
                        return Err(ProtocolError::UnknownSession(request.session_id).into());
                    }
                    let frame = {
                        let chunk = self.chunks.get(request.seq_num).ok_or(
                            FrameError::Malformed {
                                reason: "resend request for out-of-range sequence number",
                            },
                        )?;
                        Frame::data(self.session_id, chunk.seq_num, chunk.payload.clone())
                    };
                    stream.write_frame(&frame).await?;
                    outcome.resends_served += 1;
                    if let Some(progress) = &self.progress {
                        progress.record_resend_served();
                    }
                    tracing::debug!(seq_num = request.seq_num, "chunk resent");
                }
            }
        }

        Ok(outcome)
    }
}
