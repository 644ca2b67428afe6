//! Content hashing for cache keys.
//!
//! The embedding cache is content-addressed: two callers embedding the same
//! text share one entry. Keys are derived from the full 256-bit BLAKE3
//! digest of the exact text — no normalization is applied here, so callers
//! that want case- or whitespace-insensitive sharing must normalize before
//! hashing.

/// Prefix for embedding-cache keys.
pub const EMBEDDING_KEY_PREFIX: &str = "emb";

/// Computes the 32-byte BLAKE3 digest of a text.
#[inline]
pub fn hash_text(text: &str) -> [u8; 32] {
    *blake3::hash(text.as_bytes()).as_bytes()
}

/// Derives the embedding-cache key for a text: `emb:<lowercase hex digest>`.
///
/// Same text ⇒ same key ⇒ same cached vector. The full digest is used
/// (not a truncation) so a key collision would require a BLAKE3 collision.
#[inline]
pub fn embedding_key(text: &str) -> String {
    let digest = blake3::hash(text.as_bytes());
    format!("{}:{}", EMBEDDING_KEY_PREFIX, digest.to_hex())
}
