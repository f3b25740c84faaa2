//! Receiver state machine — consumes one transfer: metadata, the streamed
//! chunk pass, then recovery rounds until every sequence number is held or
//! the retry budget runs out.
//!
//! A failed chunk digest triggers an immediate resend request, but the
//! receiver keeps draining frames already in flight rather than blocking
//! on the replacement. Replacements arrive interleaved with the tail of
//! the initial pass; duplicates are resolved last-write-wins.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use ferry_core::chunk::{reassemble, ChunkStore};
use ferry_core::digest::file_digest;
use ferry_core::error::{IntegrityError, ProtocolError, TransferError};
use ferry_core::wire::{FrameError, ResendRequest, TransferMeta, MAX_PAYLOAD};

/// Default bound on the sender-declared file length, mirroring the
/// server's default upload bound.
const DEFAULT_MAX_FILE_LEN: u64 = 256 * 1024 * 1024;

use crate::report::{TransferReport, TransferStatus};
use crate::stream::FrameStream;

/// What a finished receive produced. `data` is present only on Success.
#[derive(Debug)]
pub struct ReceiverOutcome {
    pub data: Option<Bytes>,
    pub report: TransferReport,
}

pub struct ReceiverSession {
    max_resend_attempts: u32,
    max_file_len: u64,
}

impl Default for ReceiverSession {
    fn default() -> Self {
        Self::new(3)
    }
}

impl ReceiverSession {
    pub fn new(max_resend_attempts: u32) -> Self {
        Self {
            max_resend_attempts,
            max_file_len: DEFAULT_MAX_FILE_LEN,
        }
    }

    /// Bound the sender-declared file length. Metadata above it is
    /// rejected before anything is allocated for the transfer.
    pub fn with_max_file_len(mut self, max_file_len: u64) -> Self {
        self.max_file_len = max_file_len;
        self
    }

    /// Run the session to completion. `Err` means an unrecoverable frame,
    /// protocol, or transport failure; every recoverable path terminates
    /// in a report instead.
    pub async fn run<S>(
        &self,
        stream: &mut FrameStream<S>,
    ) -> Result<ReceiverOutcome, TransferError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let meta = stream.read_meta().await?;
        self.check_meta(&meta)?;
        tracing::debug!(
            session_id = meta.session_id,
            total_chunks = meta.total_chunks,
            file_len = meta.file_len,
            "metadata received"
        );

        let total = meta.total_chunks;
        let mut store = ChunkStore::new();
        // Resend requests issued per sequence number, against the budget.
        let mut attempts: HashMap<u32, u32> = HashMap::new();
        // Requested during the streaming pass, replacement not yet seen.
        let mut pending: HashSet<u32> = HashSet::new();
        // Last arrival for this sequence failed its digest check. Decides
        // ChecksumMismatch vs Incomplete when the budget runs out.
        let mut dirty: HashSet<u32> = HashSet::new();
        let mut resend_requests = 0u32;
        let mut sender_gone = false;

        // Streaming pass: drain everything up to the terminator. Corrupt
        // frames are re-requested immediately and reading continues.
        loop {
            let frame = match stream.read_frame().await? {
                None => {
                    sender_gone = true;
                    break;
                }
                Some(frame) => frame,
            };
            if frame.is_end() {
                break;
            }
            self.check_addressing(&meta, frame.session_id, frame.seq_num)?;

            if !frame.verify() {
                let seq_num = frame.seq_num;
                tracing::warn!(
                    error = %IntegrityError::ChunkMismatch { seq_num },
                    "requesting resend"
                );
                dirty.insert(seq_num);
                let issued = attempts.entry(seq_num).or_insert(0);
                if *issued >= self.max_resend_attempts {
                    tracing::error!(seq_num, "resend attempts exhausted");
                    return Ok(self.failed(
                        TransferStatus::ChecksumMismatch,
                        &meta,
                        &store,
                        resend_requests,
                    ));
                }
                *issued += 1;
                stream
                    .write_resend(&ResendRequest {
                        session_id: meta.session_id,
                        seq_num,
                    })
                    .await?;
                resend_requests += 1;
                pending.insert(seq_num);
                continue;
            }

            dirty.remove(&frame.seq_num);
            pending.remove(&frame.seq_num);
            if store.insert(frame.seq_num, frame.payload) {
                tracing::debug!(seq_num = frame.seq_num, "duplicate chunk, last write wins");
            }
        }

        // Recovery rounds: request every gap, read until each request is
        // answered, repeat until complete or out of budget.
        loop {
            let missing = store.missing(total);
            if missing.is_empty() {
                break;
            }
            if sender_gone {
                tracing::warn!(
                    session_id = meta.session_id,
                    missing = missing.len(),
                    "sender closed with chunks outstanding"
                );
                return Ok(self.failed(
                    TransferStatus::Incomplete,
                    &meta,
                    &store,
                    resend_requests,
                ));
            }

            for &seq_num in &missing {
                if pending.contains(&seq_num) {
                    // Already requested during the streaming pass.
                    continue;
                }
                let issued = attempts.entry(seq_num).or_insert(0);
                if *issued >= self.max_resend_attempts {
                    let status = if dirty.contains(&seq_num) {
                        TransferStatus::ChecksumMismatch
                    } else {
                        TransferStatus::Incomplete
                    };
                    tracing::error!(seq_num, %status, "resend attempts exhausted");
                    return Ok(self.failed(status, &meta, &store, resend_requests));
                }
                *issued += 1;
                stream
                    .write_resend(&ResendRequest {
                        session_id: meta.session_id,
                        seq_num,
                    })
                    .await?;
                resend_requests += 1;
            }
            pending.clear();

            let mut expected: HashSet<u32> = missing.into_iter().collect();
            while !expected.is_empty() {
                let frame = match stream.read_frame().await? {
                    None => {
                        sender_gone = true;
                        break;
                    }
                    Some(frame) => frame,
                };
                if frame.is_end() {
                    continue;
                }
                self.check_addressing(&meta, frame.session_id, frame.seq_num)?;
                expected.remove(&frame.seq_num);

                if !frame.verify() {
                    let seq_num = frame.seq_num;
                    tracing::warn!(
                        error = %IntegrityError::ChunkMismatch { seq_num },
                        "resent chunk failed verification"
                    );
                    dirty.insert(seq_num);
                    continue;
                }
                dirty.remove(&frame.seq_num);
                if store.insert(frame.seq_num, frame.payload) {
                    tracing::debug!(seq_num = frame.seq_num, "duplicate chunk, last write wins");
                }
            }
        }

        let data = match reassemble(store.payloads(), total) {
            Ok(data) => data,
            Err(gap) => {
                tracing::error!(session_id = meta.session_id, %gap, "reassembly failed");
                return Ok(self.failed(
                    TransferStatus::Incomplete,
                    &meta,
                    &store,
                    resend_requests,
                ));
            }
        };

        if data.len() as u64 != meta.file_len || file_digest(&data) != meta.file_digest {
            tracing::error!(
                session_id = meta.session_id,
                error = %IntegrityError::WholeFileMismatch,
                "transfer failed"
            );
            return Ok(self.failed(
                TransferStatus::ChecksumMismatch,
                &meta,
                &store,
                resend_requests,
            ));
        }

        tracing::info!(
            session_id = meta.session_id,
            bytes = data.len(),
            resend_requests,
            "transfer complete"
        );
        Ok(ReceiverOutcome {
            report: TransferReport {
                status: TransferStatus::Success,
                session_id: meta.session_id,
                total_chunks: total,
                bytes_transferred: data.len() as u64,
                resend_requests,
                missing_seq_nums: Vec::new(),
            },
            data: Some(data),
        })
    }

    /// Sender-declared sizes are untrusted input. Anything the metadata
    /// claims that the protocol cannot actually produce is rejected here,
    /// before missing-set or reassembly buffers are sized from it.
    fn check_meta(&self, meta: &TransferMeta) -> Result<(), TransferError> {
        if meta.file_len > self.max_file_len {
            return Err(FrameError::Malformed {
                reason: "declared file length exceeds maximum",
            }
            .into());
        }
        // Every data chunk carries at least one byte and at most
        // MAX_PAYLOAD, so total_chunks must fit between those bounds.
        if u64::from(meta.total_chunks) > meta.file_len
            || meta.file_len > u64::from(meta.total_chunks) * MAX_PAYLOAD as u64
        {
            return Err(FrameError::Malformed {
                reason: "chunk count inconsistent with declared file length",
            }
            .into());
        }
        Ok(())
    }

    fn check_addressing(
        &self,
        meta: &TransferMeta,
        session_id: u32,
        seq_num: u32,
    ) -> Result<(), TransferError> {
        if session_id != meta.session_id {
            return Err(ProtocolError::UnknownSession(session_id).into());
        }
        if seq_num >= meta.total_chunks {
            return Err(FrameError::Malformed {
                reason: "sequence number out of range",
            }
            .into());
        }
        Ok(())
    }

    fn failed(
        &self,
        status: TransferStatus,
        meta: &TransferMeta,
        store: &ChunkStore,
        resend_requests: u32,
    ) -> ReceiverOutcome {
        let bytes_transferred = store
            .payloads()
            .values()
            .map(|payload| payload.len() as u64)
            .sum();
        ReceiverOutcome {
            data: None,
            report: TransferReport {
                status,
                session_id: meta.session_id,
                total_chunks: meta.total_chunks,
                bytes_transferred,
                resend_requests,
                missing_seq_nums: store.missing(meta.total_chunks),
            },
        }
    }
}
