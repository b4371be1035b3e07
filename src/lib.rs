//! Notelink - Related-note discovery for markdown vaults
//!
//! A hybrid candidate-generation and safe-mutation engine: notes are indexed
//! incrementally by content fingerprint, ranked pairwise with dual signals
//! (semantic embeddings + BM25) fused via Reciprocal Rank Fusion, filtered
//! against prior human decisions and existing links, and accepted links are
//! applied to note files with atomic writes and an audit trail.

pub mod candidates;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexing;
pub mod lexical;
pub mod markdown;
pub mod similarity;
pub mod storage;
pub mod vault;
pub mod writer;

pub use error::{LinkerError, Result};
