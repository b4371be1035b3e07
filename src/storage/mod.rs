//! Persistence layer
//!
//! Embedded SQLite storage for note records, the fingerprint-keyed
//! embedding cache, review decisions, and the append-only audit log.

mod audit;
mod database;
mod decisions;
mod embeddings;
mod notes;

pub use audit::{AuditAction, AuditEntry};
pub use database::{Database, DbPool, DbStats};
pub use decisions::{PairKey, Verdict};
pub use notes::NoteRecord;
