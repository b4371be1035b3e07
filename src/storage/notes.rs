//! Note record persistence
//!
//! The path -> fingerprint registry that drives incremental indexing diffs.

use crate::error::Result;
use crate::storage::Database;
use rusqlite::params;

/// Persistent record of an indexed note
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub relative_path: String,
    pub fingerprint: String,
    pub indexed_at: String,
}

impl Database {
    /// Insert or update the record for a note path
    pub fn upsert_note(&self, relative_path: &str, fingerprint: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO notes (relative_path, fingerprint, indexed_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(relative_path)
             DO UPDATE SET fingerprint = ?2, indexed_at = ?3",
            params![relative_path, fingerprint, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Retrieve all note records, ordered by path
    pub fn all_notes(&self) -> Result<Vec<NoteRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT relative_path, fingerprint, indexed_at FROM notes ORDER BY relative_path",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(NoteRecord {
                relative_path: row.get(0)?,
                fingerprint: row.get(1)?,
                indexed_at: row.get(2)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Delete note records by relative path, returning how many were removed
    pub fn delete_notes(&self, relative_paths: &[String]) -> Result<usize> {
        let conn = self.get_conn()?;
        let mut deleted = 0;
        for path in relative_paths {
            deleted += conn.execute("DELETE FROM notes WHERE relative_path = ?1", params![path])?;
        }
        if deleted > 0 {
            tracing::info!("Deleted {} note record(s)", deleted);
        }
        Ok(deleted)
    }

    /// Count indexed note records
    pub fn count_notes(&self) -> Result<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_and_list() {
        let db = Database::in_memory().unwrap();
        db.upsert_note("b.md", "hash-b").unwrap();
        db.upsert_note("a.md", "hash-a").unwrap();

        let notes = db.all_notes().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].relative_path, "a.md");
        assert_eq!(notes[1].fingerprint, "hash-b");
    }

    #[test]
    fn test_upsert_replaces_fingerprint() {
        let db = Database::in_memory().unwrap();
        db.upsert_note("a.md", "old").unwrap();
        db.upsert_note("a.md", "new").unwrap();

        let notes = db.all_notes().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].fingerprint, "new");
    }

    #[test]
    fn test_delete_notes() {
        let db = Database::in_memory().unwrap();
        db.upsert_note("a.md", "h1").unwrap();
        db.upsert_note("b.md", "h2").unwrap();

        let deleted = db
            .delete_notes(&["a.md".to_string(), "missing.md".to_string()])
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.count_notes().unwrap(), 1);
    }
}
