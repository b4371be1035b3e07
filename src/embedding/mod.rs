//! Embedding generation
//!
//! Provides the `EmbeddingProvider` capability trait and the default local
//! implementation. Providers are constructed by the orchestration layer and
//! passed in explicitly; nothing in the engine holds a process-wide model
//! singleton, so alternative backends (remote APIs, test doubles) swap in
//! without touching any caller.

mod provider;

pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
