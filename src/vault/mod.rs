//! Vault domain model and content identity
//!
//! A note's durable identity is its content fingerprint, not its path.
//! Paths only matter as mutation targets; renames do not invalidate
//! cached embeddings or recorded decisions.

mod scanner;

pub use scanner::scan_vault;

/// A single markdown note in the vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// Path relative to the vault root (e.g. `notes/my-note.md`)
    pub relative_path: String,
    /// Raw markdown content of the note file
    pub content: String,
    /// BLAKE3 hex digest of the raw content bytes
    pub fingerprint: String,
}

impl Note {
    /// Create a note from its path and raw content, computing the fingerprint
    pub fn new(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let fingerprint = fingerprint(content.as_bytes());
        Self {
            relative_path: relative_path.into(),
            content,
            fingerprint,
        }
    }
}

/// Compute the 256-bit BLAKE3 content fingerprint as a 64-character hex string.
///
/// Pure and deterministic: identical bytes always yield the identical
/// fingerprint regardless of path or indexing history. This is the sole
/// key for the embedding cache and for decision staleness checks.
pub fn fingerprint(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
