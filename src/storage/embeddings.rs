//! Embedding cache persistence
//!
//! Vectors are keyed by content fingerprint: once a fingerprint has a
//! cached vector it is never recomputed, even if the note's path changes.
//! Blobs are little-endian f32, 4 bytes per dimension.

use crate::error::Result;
use crate::storage::Database;
use ahash::AHashMap;
use rusqlite::params;

/// Serialise an embedding vector to a binary blob
fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Deserialise a binary blob back to an embedding vector
fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

impl Database {
    /// Persist embedding vectors, skipping fingerprints already cached.
    ///
    /// Returns the number of new vectors actually saved. Combined with the
    /// cache lookup in the indexing pass this guarantees the provider runs
    /// at most once per distinct fingerprint.
    pub fn save_embeddings(
        &self,
        entries: &[(String, Vec<f32>)],
        model: &str,
        dimension: usize,
    ) -> Result<usize> {
        let conn = self.get_conn()?;
        let now = chrono::Utc::now().to_rfc3339();

        let mut saved = 0;
        for (fingerprint, vector) in entries {
            let inserted = conn.execute(
                "INSERT INTO embeddings (fingerprint, vector, model, dimension, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(fingerprint) DO NOTHING",
                params![
                    fingerprint,
                    vector_to_bytes(vector),
                    model,
                    dimension as i64,
                    now
                ],
            )?;
            saved += inserted;
        }

        if saved > 0 {
            tracing::info!("Saved {} new embedding(s) (model={})", saved, model);
        }
        Ok(saved)
    }

    /// Retrieve cached embeddings for the given fingerprints.
    /// Fingerprints without a cached vector are omitted from the result.
    pub fn cached_embeddings(&self, fingerprints: &[String]) -> Result<AHashMap<String, Vec<f32>>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT vector FROM embeddings WHERE fingerprint = ?1 LIMIT 1")?;

        let mut cached = AHashMap::new();
        for fingerprint in fingerprints {
            let row: Option<Vec<u8>> = stmt
                .query_row(params![fingerprint], |row| row.get(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            if let Some(bytes) = row {
                cached.insert(fingerprint.clone(), bytes_to_vector(&bytes));
            }
        }
        Ok(cached)
    }

    /// Retrieve every cached embedding, keyed by fingerprint
    pub fn all_embeddings(&self) -> Result<AHashMap<String, Vec<f32>>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT fingerprint, vector FROM embeddings")?;
        let rows = stmt.query_map([], |row| {
            let fingerprint: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((fingerprint, bytes_to_vector(&bytes)))
        })?;

        let mut all = AHashMap::new();
        for row in rows {
            let (fingerprint, vector) = row?;
            all.insert(fingerprint, vector);
        }
        Ok(all)
    }

    /// Count cached embeddings
    pub fn count_embeddings(&self) -> Result<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
