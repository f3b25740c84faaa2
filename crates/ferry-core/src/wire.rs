//! Ferry wire format — on-wire types for the chunk transfer protocol.
//!
//! These types ARE the protocol. Every field, every size is part of the
//! wire format; changing anything here is a breaking change. All headers
//! use fixed-width unsigned big-endian fields via zerocopy byteorder
//! types in #[repr(C)] structs, so layout is deterministic and there is
//! no unsafe code in this module.
//!
//! Stream layout per direction:
//!
//!   sender → receiver: TransferMeta, then one Frame per chunk in
//!                      ascending seq order, then a zero-length Frame
//!                      (end-of-transmission), then resent Frames on demand.
//!   receiver → sender: ResendRequest (8 bytes) at any time after the
//!                      metadata; the receiver closes the connection to
//!                      end the retransmission phase.

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::digest::{self, CHUNK_DIGEST_LEN, FILE_DIGEST_LEN};

type U32be = U32<BigEndian>;
type U64be = U64<BigEndian>;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Maximum frame payload size in bytes. A header claiming more is malformed.
/// This also bounds the configurable chunk size.
pub const MAX_PAYLOAD: usize = 256 * 1024;

/// Wire size of the metadata handshake.
pub const META_LEN: usize = 48;

/// Wire size of a frame header (payload and digest follow it).
pub const FRAME_HEADER_LEN: usize = 12;

/// Wire size of a retransmission request.
pub const RESEND_LEN: usize = 8;

// ── Raw headers ───────────────────────────────────────────────────────────────

/// Metadata handshake — sent once by the sender before the first frame.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
struct MetaHeader {
    session_id: U32be,
    total_chunks: U32be,
    file_len: U64be,
    file_digest: [u8; FILE_DIGEST_LEN],
}

assert_eq_size!(MetaHeader, [u8; META_LEN]);

/// Frame header — precedes every chunk payload.
///
/// `payload_len` must equal the actual payload byte count that follows.
/// The decoder never trusts a mismatched length: it reads exactly
/// `payload_len` bytes or fails.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
struct FrameHeader {
    session_id: U32be,
    seq_num: U32be,
    payload_len: U32be,
}

assert_eq_size!(FrameHeader, [u8; FRAME_HEADER_LEN]);

/// Retransmission request — receiver → sender.
///
/// Session-scoped by design: a request naming a foreign session is a
/// protocol violation, not something to route.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
struct ResendHeader {
    session_id: U32be,
    seq_num: U32be,
}

assert_eq_size!(ResendHeader, [u8; RESEND_LEN]);

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when decoding wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes available than the message declares. Also produced when
    /// the stream ends mid-message.
    #[error("truncated message: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Header fields out of valid range.
    #[error("malformed message: {reason}")]
    Malformed { reason: &'static str },
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// The wire representation of one chunk: header, payload, chunk digest.
///
/// A zero-length payload marks end-of-transmission; every data chunk has a
/// payload length greater than zero, so the marker is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub session_id: u32,
    pub seq_num: u32,
    pub payload: Bytes,
    pub digest: [u8; CHUNK_DIGEST_LEN],
}

impl Frame {
    /// Build a data frame, computing the payload digest.
    pub fn data(session_id: u32, seq_num: u32, payload: Bytes) -> Self {
        let digest = digest::chunk_digest(&payload);
        Self {
            session_id,
            seq_num,
            payload,
            digest,
        }
    }

    /// Build the end-of-transmission marker frame.
    pub fn end_of_transmission(session_id: u32) -> Self {
        Self::data(session_id, 0, Bytes::new())
    }

    /// True for the zero-length end-of-transmission marker.
    pub fn is_end(&self) -> bool {
        self.payload.is_empty()
    }

    /// Recompute the payload digest and compare against the carried one.
    pub fn verify(&self) -> bool {
        digest::chunk_digest(&self.payload) == self.digest
    }

    /// Encoded size on the wire.
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_LEN + self.payload.len() + CHUNK_DIGEST_LEN
    }

    /// Serialize to wire format.
    pub fn encode(&self) -> Bytes {
        let header = FrameHeader {
            session_id: U32be::new(self.session_id),
            seq_num: U32be::new(self.seq_num),
            payload_len: U32be::new(self.payload.len() as u32),
        };
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(header.as_bytes());
        buf.put_slice(&self.payload);
        buf.put_slice(&self.digest);
        buf.freeze()
    }

    /// Decode one frame from the front of `buf`.
    ///
    /// Returns the frame and the number of bytes consumed, so callers can
    /// decode from a stream buffer holding more than one message.
    pub fn decode(buf: &[u8]) -> Result<(Frame, usize), FrameError> {
        let header = FrameHeader::read_from_prefix(buf).ok_or(FrameError::Truncated {
            needed: FRAME_HEADER_LEN,
            available: buf.len(),
        })?;

        let payload_len = header.payload_len.get() as usize;
        if payload_len > MAX_PAYLOAD {
            return Err(FrameError::Malformed {
                reason: "payload length exceeds maximum",
            });
        }

        let total = FRAME_HEADER_LEN + payload_len + CHUNK_DIGEST_LEN;
        if buf.len() < total {
            return Err(FrameError::Truncated {
                needed: total,
                available: buf.len(),
            });
        }

        let payload = Bytes::copy_from_slice(&buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + payload_len]);
        let mut chunk_digest = [0u8; CHUNK_DIGEST_LEN];
        chunk_digest.copy_from_slice(&buf[FRAME_HEADER_LEN + payload_len..total]);

        Ok((
            Frame {
                session_id: header.session_id.get(),
                seq_num: header.seq_num.get(),
                payload,
                digest: chunk_digest,
            },
            total,
        ))
    }
}

// ── Transfer metadata ─────────────────────────────────────────────────────────

/// The metadata handshake, in decoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMeta {
    pub session_id: u32,
    pub total_chunks: u32,
    pub file_len: u64,
    pub file_digest: [u8; FILE_DIGEST_LEN],
}

impl TransferMeta {
    pub fn encode(&self) -> Bytes {
        let header = MetaHeader {
            session_id: U32be::new(self.session_id),
            total_chunks: U32be::new(self.total_chunks),
            file_len: U64be::new(self.file_len),
            file_digest: self.file_digest,
        };
        Bytes::copy_from_slice(header.as_bytes())
    }

    pub fn decode(buf: &[u8]) -> Result<(TransferMeta, usize), FrameError> {
        let header = MetaHeader::read_from_prefix(buf).ok_or(FrameError::Truncated {
            needed: META_LEN,
            available: buf.len(),
        })?;
        Ok((
            TransferMeta {
                session_id: header.session_id.get(),
                total_chunks: header.total_chunks.get(),
                file_len: header.file_len.get(),
                file_digest: header.file_digest,
            },
            META_LEN,
        ))
    }
}

// ── Resend request ────────────────────────────────────────────────────────────

/// A retransmission request, in decoded form. Always addresses exactly one
/// sequence number — never a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendRequest {
    pub session_id: u32,
    pub seq_num: u32,
}

impl ResendRequest {
    pub fn encode(&self) -> Bytes {
        let header = ResendHeader {
            session_id: U32be::new(self.session_id),
            seq_num: U32be::new(self.seq_num),
        };
        Bytes::copy_from_slice(header.as_bytes())
    }

    pub fn decode(buf: &[u8]) -> Result<(ResendRequest, usize), FrameError> {
        let header = ResendHeader::read_from_prefix(buf).ok_or(FrameError::Truncated {
            needed: RESEND_LEN,
            available: buf.len(),
        })?;
        Ok((
            ResendRequest {
                session_id: header.session_id.get(),
                seq_num: header.seq_num.get(),
            },
            RESEND_LEN,
        ))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
