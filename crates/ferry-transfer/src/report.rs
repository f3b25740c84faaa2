//! Transfer outcome — what a finished session reports to logging and CLI
//! layers. Every session terminates in exactly one status; there is no
//! silent partial success.

use serde::{Deserialize, Serialize};

/// Terminal status of one transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// All chunks delivered and the whole-file digest matched.
    Success,
    /// A digest check failed beyond recovery — per-chunk retries exhausted
    /// or the reassembled file did not match the declared digest.
    ChecksumMismatch,
    /// The peer went away before every sequence number was delivered.
    Incomplete,
    /// The session died on an unrecoverable frame, protocol, or transport
    /// error.
    Aborted,
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransferStatus::Success => "success",
            TransferStatus::ChecksumMismatch => "checksum mismatch",
            TransferStatus::Incomplete => "incomplete",
            TransferStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// The result object handed to external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReport {
    pub status: TransferStatus,
    pub session_id: u32,
    pub total_chunks: u32,
    pub bytes_transferred: u64,
    /// Retransmission requests issued over the session's lifetime.
    pub resend_requests: u32,
    /// Sequence numbers never delivered, ascending. Populated for any
    /// non-Success status; always empty on Success.
    pub missing_seq_nums: Vec<u32>,
}

impl TransferReport {
    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Success
    }

    /// Report for a session that died before producing a real outcome.
    pub fn aborted(session_id: u32) -> Self {
        Self {
            status: TransferStatus::Aborted,
            session_id,
            total_chunks: 0,
            bytes_transferred: 0,
            resend_requests: 0,
            missing_seq_nums: Vec::new(),
        }
    }
}
