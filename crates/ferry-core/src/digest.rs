//! Integrity digests — whole-file and per-chunk, both BLAKE3.
//!
//! The whole-file digest (32 bytes) is the authoritative end-to-end
//! correctness signal; the per-chunk digest (16 bytes, truncated) only
//! decides accept-vs-re-request for a single chunk. The receiver never
//! substitutes one for the other: even if every chunk digest matched, the
//! reassembled file must still match the whole-file digest.

/// Width of the whole-file digest.
pub const FILE_DIGEST_LEN: usize = 32;

/// Width of the per-chunk digest.
pub const CHUNK_DIGEST_LEN: usize = 16;

/// BLAKE3 over the entire file.
pub fn file_digest(data: &[u8]) -> [u8; FILE_DIGEST_LEN] {
    *blake3::hash(data).as_bytes()
}

/// Truncated BLAKE3 over one chunk's payload.
pub fn chunk_digest(data: &[u8]) -> [u8; CHUNK_DIGEST_LEN] {
    let full = blake3::hash(data);
    let mut out = [0u8; CHUNK_DIGEST_LEN];
    out.copy_from_slice(&full.as_bytes()[..CHUNK_DIGEST_LEN]);
    out
}
