//! Protocol error taxonomy.
//!
//! `FrameError` lives beside the codec in `wire`; everything else is here.
//! Frame and transport errors abort only the affected session. A chunk
//! digest mismatch is recovered via bounded retransmission before it
//! escalates; a whole-file mismatch always surfaces as transfer failure and
//! is never retried at the file level. `InvalidConfig` is fatal at startup,
//! not per-session.

use crate::wire::FrameError;

/// Corruption detected at one of the two digest granularities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("chunk {seq_num} digest mismatch")]
    ChunkMismatch { seq_num: u32 },

    #[error("whole-file digest mismatch after reassembly")]
    WholeFileMismatch,
}

/// Violations of the transfer protocol itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("duplicate sequence number {0}")]
    DuplicateSeqNum(u32),

    #[error("unknown session {0}")]
    UnknownSession(u32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failures at the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed by peer")]
    Closed,

    #[error("i/o timed out")]
    Timeout,
}

/// Umbrella error for a transfer session.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
