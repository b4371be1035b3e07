//! Decision store
//!
//! Persists human YES/NO verdicts per canonical note pair, recorded with
//! the content fingerprints of both notes at decision time. A decision is
//! only honoured while both fingerprints still match; edits to either side
//! make the pair eligible to reappear for review. SKIP is a transient
//! review-layer notion and has no representation here.

use crate::error::Result;
use crate::storage::Database;
use ahash::{AHashMap, AHashSet};
use rusqlite::params;

/// Canonical (sorted) pair of note paths
pub type PairKey = (String, String);

/// Human verdict on a candidate pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Yes,
    No,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Yes => "YES",
            Verdict::No => "NO",
        }
    }
}

/// Sort two paths into the canonical pair order
pub(crate) fn canonical_pair(a: &str, b: &str) -> PairKey {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl Database {
    /// Save or update a review decision for a note pair.
    ///
    /// Paths are stored in sorted order with fingerprints matched to that
    /// order, so (A,B) and (B,A) hit the same row. Duplicate saves on the
    /// same pair resolve by upsert, last write wins.
    pub fn save_decision(
        &self,
        path_a: &str,
        path_b: &str,
        verdict: Verdict,
        fingerprint_a: &str,
        fingerprint_b: &str,
    ) -> Result<()> {
        let (canon_a, canon_b) = canonical_pair(path_a, path_b);
        let (hash_a, hash_b) = if canon_a == path_a {
            (fingerprint_a, fingerprint_b)
        } else {
            (fingerprint_b, fingerprint_a)
        };

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO decisions (path_a, path_b, verdict, fingerprint_a, fingerprint_b, decided_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(path_a, path_b)
             DO UPDATE SET verdict = ?3, fingerprint_a = ?4, fingerprint_b = ?5, decided_at = ?6",
            params![
                canon_a,
                canon_b,
                verdict.as_str(),
                hash_a,
                hash_b,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;

        tracing::debug!(
            "Saved decision for ({}, {}): {}",
            canon_a,
            canon_b,
            verdict.as_str()
        );
        Ok(())
    }

    /// Pair keys of decisions that are still valid given current content.
    ///
    /// A decision is valid when both notes are present in
    /// `current_fingerprints` and their fingerprints match the ones
    /// recorded at decision time. Stale decisions are simply not returned;
    /// they stay in the table in case the content is reverted.
    pub fn valid_decisions(
        &self,
        current_fingerprints: &AHashMap<String, String>,
    ) -> Result<AHashSet<PairKey>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT path_a, path_b, fingerprint_a, fingerprint_b FROM decisions")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut valid = AHashSet::new();
        for row in rows {
            let (path_a, path_b, hash_a, hash_b) = row?;
            let current_a = current_fingerprints.get(&path_a);
            let current_b = current_fingerprints.get(&path_b);
            if current_a == Some(&hash_a) && current_b == Some(&hash_b) {
                valid.insert((path_a, path_b));
            }
        }
        Ok(valid)
    }
}
