//! SQLite database management with migrations

use crate::error::{LinkerError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the linker database at the given path
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LinkerError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);

        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| LinkerError::Pool(format!("Failed to create connection pool: {}", e)))?;

        // WAL keeps read-heavy candidate queries from blocking on the
        // occasional decision or audit write
        {
            let conn = pool
                .get()
                .map_err(|e| LinkerError::Pool(format!("Failed to get connection: {}", e)))?;
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        let db = Self { pool };
        db.migrate()?;

        Ok(db)
    }

    /// Open an in-memory database (tests)
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| LinkerError::Pool(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.migrate()?;
        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| LinkerError::Pool(format!("Failed to get connection: {}", e)))
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);
                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let note_count: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
        let embedding_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        let decision_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM decisions", [], |row| row.get(0))?;
        let audit_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;

        Ok(DbStats {
            note_count: note_count as usize,
            embedding_count: embedding_count as usize,
            decision_count: decision_count as usize,
            audit_count: audit_count as usize,
        })
    }
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub note_count: usize,
    pub embedding_count: usize,
    pub decision_count: usize,
    pub audit_count: usize,
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Indexed notes (path -> current fingerprint)
    CREATE TABLE notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        relative_path TEXT NOT NULL UNIQUE,
        fingerprint TEXT NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX idx_notes_fingerprint ON notes(fingerprint);

    -- Embedding cache, keyed by content fingerprint.
    -- Identical content shares one vector regardless of path.
    CREATE TABLE embeddings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        fingerprint TEXT NOT NULL UNIQUE,
        vector BLOB NOT NULL,
        model TEXT NOT NULL,
        dimension INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    -- Review decisions on canonical (sorted) note pairs, with the
    -- fingerprints both notes had at decision time
    CREATE TABLE decisions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path_a TEXT NOT NULL,
        path_b TEXT NOT NULL,
        verdict TEXT NOT NULL,
        fingerprint_a TEXT NOT NULL,
        fingerprint_b TEXT NOT NULL,
        decided_at TEXT NOT NULL,
        UNIQUE(path_a, path_b)
    );

    CREATE INDEX idx_decisions_paths ON decisions(path_a, path_b);

    -- Append-only audit trail of every file mutation
    CREATE TABLE audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        path TEXT NOT NULL,
        action TEXT NOT NULL,
        detail TEXT NOT NULL
    );

    CREATE INDEX idx_audit_path ON audit_log(path);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("linker.db");

        let _db = Database::new(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_migrations_recorded() {
        let db = Database::in_memory().unwrap();
        let conn = db.get_conn().unwrap();

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_schema_exists() {
        let db = Database::in_memory().unwrap();
        let conn = db.get_conn().unwrap();

        for table in ["notes", "embeddings", "decisions", "audit_log"] {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_stats_empty() {
        let db = Database::in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.note_count, 0);
        assert_eq!(stats.embedding_count, 0);
        assert_eq!(stats.decision_count, 0);
        assert_eq!(stats.audit_count, 0);
    }
}
