//! Append-only audit log
//!
//! One entry per file mutation attempt that reached the apply step,
//! including idempotent no-ops (distinguishable by action). Entries are
//! never mutated or deleted; the trail plus the no-op check is what makes
//! a half-applied pair recoverable.

use crate::error::Result;
use crate::storage::Database;
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// What kind of mutation an audit entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    /// A link line was inserted and the file rewritten
    LinkInserted,
    /// The link was already present; the file was left untouched
    LinkNoop,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::LinkInserted => "link-inserted",
            AuditAction::LinkNoop => "link-noop",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "link-inserted" => Some(AuditAction::LinkInserted),
            "link-noop" => Some(AuditAction::LinkNoop),
            _ => None,
        }
    }
}

/// One recorded mutation
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: String,
    /// Relative path of the mutated note
    pub path: String,
    pub action: AuditAction,
    /// JSON payload with the inserted line and link target, enough to
    /// reconstruct the diff
    pub detail: String,
}

impl Database {
    /// Append one audit entry
    pub fn append_audit(&self, path: &str, action: AuditAction, detail: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO audit_log (timestamp, path, action, detail) VALUES (?1, ?2, ?3, ?4)",
            params![
                chrono::Utc::now().to_rfc3339(),
                path,
                action.as_str(),
                detail
            ],
        )?;
        Ok(())
    }

    /// All audit entries for one note path, oldest first
    pub fn audit_entries_for(&self, path: &str) -> Result<Vec<AuditEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, path, action, detail FROM audit_log WHERE path = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![path], map_entry)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// The complete audit trail, oldest first
    pub fn all_audit_entries(&self) -> Result<Vec<AuditEntry>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT timestamp, path, action, detail FROM audit_log ORDER BY id")?;
        let rows = stmt.query_map([], map_entry)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

fn map_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    let action: String = row.get(2)?;
    Ok(AuditEntry {
        timestamp: row.get(0)?,
        path: row.get(1)?,
        action: AuditAction::parse(&action).unwrap_or(AuditAction::LinkNoop),
        detail: row.get(3)?,
    })
}
