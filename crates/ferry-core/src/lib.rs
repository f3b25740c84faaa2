//! ferry-core — wire format, chunking, digests, and the protocol error
//! taxonomy. All other Ferry crates depend on this one.

pub mod chunk;
pub mod config;
pub mod digest;
pub mod error;
pub mod wire;

pub use chunk::{reassemble, split, Chunk, ChunkSet, ChunkStore, Incomplete};
pub use digest::{chunk_digest, file_digest};
pub use error::{IntegrityError, ProtocolError, TransferError, TransportError};
pub use wire::{Frame, FrameError, ResendRequest, TransferMeta};
