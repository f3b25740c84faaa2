//! Framed stream I/O — reads and writes protocol messages over any
//! bidirectional byte stream, with a per-operation timeout.
//!
//! The transport guarantees ordered byte delivery but knows nothing about
//! application framing; this wrapper restores message boundaries. Clean EOF
//! at a message boundary surfaces as `None`; EOF mid-message is
//! `FrameError::Truncated`; an elapsed timeout is `TransportError::Timeout`.
//! Either way a stalled or vanished peer aborts its own session instead of
//! pinning the worker.

use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use ferry_core::error::{TransferError, TransportError};
use ferry_core::wire::{Frame, FrameError, ResendRequest, TransferMeta};

/// Length prefix of the upload blob.
const BLOB_PREFIX_LEN: usize = 8;

pub struct FrameStream<S> {
    io: S,
    buf: BytesMut,
    timeout: Duration,
    eof: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FrameStream<S> {
    pub fn new(io: S, timeout: Duration) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(8 * 1024),
            timeout,
            eof: false,
        }
    }

    /// Pull more bytes from the transport. Returns the number read; zero
    /// means the peer closed its write side.
    async fn fill(&mut self) -> Result<usize, TransferError> {
        let n = tokio::time::timeout(self.timeout, self.io.read_buf(&mut self.buf))
            .await
            .map_err(|_| TransportError::Timeout)??;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    /// Decode one message from the buffered stream, filling as needed.
    async fn read_message<T>(
        &mut self,
        decode: fn(&[u8]) -> Result<(T, usize), FrameError>,
    ) -> Result<Option<T>, TransferError> {
        loop {
            if !self.buf.is_empty() {
                match decode(&self.buf) {
                    Ok((msg, consumed)) => {
                        self.buf.advance(consumed);
                        return Ok(Some(msg));
                    }
                    // More bytes may still arrive; at EOF the partial
                    // message is a real truncation.
                    Err(FrameError::Truncated { .. }) if !self.eof => {}
                    Err(e) => return Err(e.into()),
                }
            } else if self.eof {
                return Ok(None);
            }
            self.fill().await?;
        }
    }

    /// Read the next frame. `None` means the peer closed cleanly at a
    /// frame boundary.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, TransferError> {
        self.read_message(Frame::decode).await
    }

    /// Read the metadata handshake. EOF before it arrives is a closed
    /// transport, not a clean end.
    pub async fn read_meta(&mut self) -> Result<TransferMeta, TransferError> {
        self.read_message(TransferMeta::decode)
            .await?
            .ok_or_else(|| TransportError::Closed.into())
    }

    /// Read the next retransmission request. `None` on clean close — the
    /// requester ending the retransmission phase.
    pub async fn read_resend(&mut self) -> Result<Option<ResendRequest>, TransferError> {
        self.read_message(ResendRequest::decode).await
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransferError> {
        tokio::time::timeout(self.timeout, self.io.write_all(data))
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(())
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), TransferError> {
        let encoded = frame.encode();
        self.write_all(&encoded).await?;
        self.flush().await
    }

    pub async fn write_meta(&mut self, meta: &TransferMeta) -> Result<(), TransferError> {
        let encoded = meta.encode();
        self.write_all(&encoded).await?;
        self.flush().await
    }

    pub async fn write_resend(&mut self, request: &ResendRequest) -> Result<(), TransferError> {
        let encoded = request.encode();
        self.write_all(&encoded).await?;
        self.flush().await
    }

    /// Send a length-prefixed blob (the upload phase).
    pub async fn write_blob(&mut self, data: &[u8]) -> Result<(), TransferError> {
        self.write_all(&(data.len() as u64).to_be_bytes()).await?;
        self.write_all(data).await?;
        self.flush().await
    }

    /// Receive a length-prefixed blob, bounded by `max_len`.
    pub async fn read_blob(&mut self, max_len: u64) -> Result<Bytes, TransferError> {
        let prefix = self.read_exact(BLOB_PREFIX_LEN).await?;
        let mut raw = [0u8; BLOB_PREFIX_LEN];
        raw.copy_from_slice(&prefix);
        let len = u64::from_be_bytes(raw);
        if len > max_len {
            return Err(FrameError::Malformed {
                reason: "blob length exceeds maximum",
            }
            .into());
        }
        self.read_exact(len as usize).await
    }

    /// Read exactly `n` bytes from the buffered stream.
    async fn read_exact(&mut self, n: usize) -> Result<Bytes, TransferError> {
        while self.buf.len() < n {
            if self.eof {
                return Err(FrameError::Truncated {
                    needed: n,
                    available: self.buf.len(),
                }
                .into());
            }
            self.fill().await?;
        }
        Ok(self.buf.split_to(n).freeze())
    }

    async fn flush(&mut self) -> Result<(), TransferError> {
        tokio::time::timeout(self.timeout, self.io.flush())
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(())
    }

    /// Close our write side, signalling the peer that no more messages
    /// will follow.
    pub async fn shutdown(&mut self) -> Result<(), TransferError> {
        tokio::time::timeout(self.timeout, self.io.shutdown())
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(())
    }
}
