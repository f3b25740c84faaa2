//! Chunking — splitting a file into fixed-size, sequence-numbered chunks
//! and reassembling them from an arbitrary arrival order.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::wire::MAX_PAYLOAD;

/// One fixed-size slice of a file. The final chunk of a file may be
/// shorter; every chunk has a non-empty payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub seq_num: u32,
    pub payload: Bytes,
}

/// An immutable set of chunks covering one file contiguously.
///
/// Built once at split time and used for both the initial send pass and
/// retransmission lookups. Chunk `i` spans bytes
/// `[i * chunk_size, i * chunk_size + len)`.
#[derive(Debug, Clone)]
pub struct ChunkSet {
    chunks: Vec<Chunk>,
    chunk_size: usize,
    total_bytes: u64,
}

impl ChunkSet {
    pub fn total_chunks(&self) -> u32 {
        self.chunks.len() as u32
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Retransmission lookup. Sequence numbers are dense, so this is an
    /// index access.
    pub fn get(&self, seq_num: u32) -> Option<&Chunk> {
        self.chunks.get(seq_num as usize)
    }

    /// Chunks in ascending sequence order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// The set as a seq → payload map, as a receiver that lost nothing
    /// would hold it.
    pub fn as_received_map(&self) -> HashMap<u32, Bytes> {
        self.chunks
            .iter()
            .map(|c| (c.seq_num, c.payload.clone()))
            .collect()
    }

    /// Build a set from explicit chunks. Rejects duplicate sequence
    /// numbers; `split` can never produce them, but hand-built sets can.
    pub fn from_chunks(mut chunks: Vec<Chunk>, chunk_size: usize) -> Result<Self, ProtocolError> {
        chunks.sort_by_key(|c| c.seq_num);
        for pair in chunks.windows(2) {
            if pair[0].seq_num == pair[1].seq_num {
                return Err(ProtocolError::DuplicateSeqNum(pair[0].seq_num));
            }
        }
        let total_bytes = chunks.iter().map(|c| c.payload.len() as u64).sum();
        Ok(Self {
            chunks,
            chunk_size,
            total_bytes,
        })
    }
}

/// Split a file into `ceil(len / chunk_size)` chunks, sequence numbers
/// `0..n-1` in byte order. Payloads are zero-copy slices of `data`.
///
/// A zero or oversized `chunk_size` is an `InvalidConfig` error — fatal at
/// startup, never per-session.
pub fn split(data: Bytes, chunk_size: usize) -> Result<ChunkSet, ProtocolError> {
    if chunk_size == 0 {
        return Err(ProtocolError::InvalidConfig(
            "chunk size must be greater than zero".into(),
        ));
    }
    if chunk_size > MAX_PAYLOAD {
        return Err(ProtocolError::InvalidConfig(format!(
            "chunk size {chunk_size} exceeds maximum payload {MAX_PAYLOAD}"
        )));
    }

    let total_bytes = data.len() as u64;
    let total_chunks = data.len().div_ceil(chunk_size);
    if total_chunks > u32::MAX as usize {
        return Err(ProtocolError::InvalidConfig(
            "file too large for 32-bit sequence numbers".into(),
        ));
    }

    let mut chunks = Vec::with_capacity(total_chunks);
    for seq_num in 0..total_chunks {
        let start = seq_num * chunk_size;
        let end = usize::min(start + chunk_size, data.len());
        chunks.push(Chunk {
            seq_num: seq_num as u32,
            payload: data.slice(start..end),
        });
    }

    Ok(ChunkSet {
        chunks,
        chunk_size,
        total_bytes,
    })
}

/// Reassembly failure: some sequence numbers never arrived.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reassembly incomplete: {} of {total_chunks} chunks missing", missing.len())]
pub struct Incomplete {
    pub total_chunks: u32,
    /// The exact missing sequence numbers, ascending.
    pub missing: Vec<u32>,
}

/// Concatenate received payloads in ascending sequence order.
///
/// Succeeds only if every sequence number in `0..total_chunks` is present;
/// otherwise returns `Incomplete` naming the gaps, never a partial result.
pub fn reassemble(received: &HashMap<u32, Bytes>, total_chunks: u32) -> Result<Bytes, Incomplete> {
    let missing: Vec<u32> = (0..total_chunks)
        .filter(|seq| !received.contains_key(seq))
        .collect();
    if !missing.is_empty() {
        return Err(Incomplete {
            total_chunks,
            missing,
        });
    }

    let total: usize = (0..total_chunks)
        .map(|seq| received[&seq].len())
        .sum();
    let mut out = BytesMut::with_capacity(total);
    for seq in 0..total_chunks {
        out.extend_from_slice(&received[&seq]);
    }
    Ok(out.freeze())
}

/// Receiver-side store for arrived chunk payloads.
///
/// Duplicate sequence numbers overwrite: last write wins, deterministically.
/// That policy is explicit here rather than incidental to the map type.
#[derive(Debug, Default)]
pub struct ChunkStore {
    payloads: HashMap<u32, Bytes>,
    overwrites: u32,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a payload. Returns true if an earlier payload for the same
    /// sequence number was replaced.
    pub fn insert(&mut self, seq_num: u32, payload: Bytes) -> bool {
        let replaced = self.payloads.insert(seq_num, payload).is_some();
        if replaced {
            self.overwrites += 1;
        }
        replaced
    }

    pub fn contains(&self, seq_num: u32) -> bool {
        self.payloads.contains_key(&seq_num)
    }

    pub fn get(&self, seq_num: u32) -> Option<&Bytes> {
        self.payloads.get(&seq_num)
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// How many inserts replaced an existing payload.
    pub fn overwrites(&self) -> u32 {
        self.overwrites
    }

    /// Sequence numbers in `0..total_chunks` not yet stored, ascending.
    pub fn missing(&self, total_chunks: u32) -> Vec<u32> {
        (0..total_chunks)
            .filter(|seq| !self.payloads.contains_key(seq))
            .collect()
    }

    pub fn payloads(&self) -> &HashMap<u32, Bytes> {
        &self.payloads
    }
}
