//! Configuration management
//!
//! Settings load from a TOML file, with environment variable overrides
//! applied on top (`NOTELINK_SECTION__KEY=value`). Everything has a
//! usable default so a config file is optional.

use crate::error::{LinkerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkerConfig {
    pub vault: VaultConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

/// Vault scanning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Root directory of the note collection
    pub root: PathBuf,
    /// Directory names skipped anywhere in the tree
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
    /// Path of the index database, relative paths resolve against `root`
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

/// Candidate scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Rank-damping constant for reciprocal rank fusion
    pub rrf_k: usize,
}

fn default_excluded_dirs() -> Vec<String> {
    vec![
        ".git".to_string(),
        ".obsidian".to_string(),
        ".trash".to_string(),
        "node_modules".to_string(),
    ]
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".notelink/index.db")
}

impl LinkerConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LinkerError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| LinkerError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: LinkerConfig = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| LinkerError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Build a configuration for a vault directory using defaults everywhere
    pub fn for_vault(root: &Path) -> Self {
        Self {
            vault: VaultConfig {
                root: root.to_path_buf(),
                excluded_dirs: default_excluded_dirs(),
                db_path: default_db_path(),
            },
            ..Self::default()
        }
    }

    /// Absolute path of the index database
    pub fn resolved_db_path(&self) -> PathBuf {
        if self.vault.db_path.is_absolute() {
            self.vault.db_path.clone()
        } else {
            self.vault.root.join(&self.vault.db_path)
        }
    }

    /// Apply environment variable overrides
    /// Environment variables in format: NOTELINK_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("NOTELINK_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "VAULT__ROOT" => {
                self.vault.root = PathBuf::from(value);
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__BATCH_SIZE" => {
                self.embedding.batch_size =
                    value.parse().map_err(|_| LinkerError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            "RETRIEVAL__RRF_K" => {
                self.retrieval.rrf_k =
                    value.parse().map_err(|_| LinkerError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.vault.root.as_os_str().is_empty() {
            return Err(LinkerError::InvalidConfigValue {
                path: "vault.root".to_string(),
                message: "Vault root cannot be empty".to_string(),
            });
        }
        if self.embedding.model.is_empty() {
            return Err(LinkerError::InvalidConfigValue {
                path: "embedding.model".to_string(),
                message: "Embedding model cannot be empty".to_string(),
            });
        }
        if self.embedding.batch_size == 0 {
            return Err(LinkerError::InvalidConfigValue {
                path: "embedding.batch_size".to_string(),
                message: "Batch size must be greater than 0".to_string(),
            });
        }
        if self.retrieval.rrf_k == 0 {
            return Err(LinkerError::InvalidConfigValue {
                path: "retrieval.rrf_k".to_string(),
                message: "rrf_k must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| LinkerError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("notelink").join("config.toml"))
    }
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            vault: VaultConfig {
                root: PathBuf::new(),
                excluded_dirs: default_excluded_dirs(),
                db_path: default_db_path(),
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                batch_size: 50,
            },
            retrieval: RetrievalConfig {
                rrf_k: crate::similarity::RRF_K,
            },
        }
    }
}
