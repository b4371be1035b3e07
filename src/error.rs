use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the note linker
#[derive(Error, Debug)]
pub enum LinkerError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Vault root does not exist or is not a directory
    #[error("Vault not found: {path}")]
    VaultNotFound { path: PathBuf },

    /// Note not found in the vault
    #[error("Note not found: {path}")]
    NoteNotFound { path: PathBuf },

    /// Embedding provider could not be initialized or is unavailable.
    ///
    /// Distinguishable from generation failures so callers can fall back
    /// to cached embeddings for candidate generation.
    #[error("Embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// A computed link insertion would touch content outside the
    /// `## Related` section
    #[error("Write rejected for {path}: change extends outside the Related section")]
    SectionViolation { path: PathBuf },

    /// Note content changed between preview and apply
    #[error("Note changed since preview, re-run preview: {path}")]
    NoteChanged { path: PathBuf },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for note linker operations
pub type Result<T> = std::result::Result<T, LinkerError>;
