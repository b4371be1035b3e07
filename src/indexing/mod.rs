//! Incremental indexing pass
//!
//! Diffs the scanned corpus against stored note records, embeds only
//! content whose fingerprint has never been seen, and persists the result.
//! The pass is a synchronous, restartable sequence: progress is reported
//! through a caller-owned sink, and nothing partial is persisted beyond
//! what each step durably commits.

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::markdown::{note_title, prepare_for_embedding};
use crate::storage::Database;
use crate::vault::Note;
use ahash::{AHashMap, AHashSet};

/// Current state of the note index, computed without side effects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    pub total_in_vault: usize,
    pub indexed: usize,
    pub needing_indexing: usize,
}

/// Summary of a completed indexing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub embeddings_computed: usize,
    pub embeddings_cached: usize,
    pub total_indexed: usize,
}

/// Phase of the indexing pass, for progress reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    Diffing,
    Embedding,
    Storing,
    Complete,
}

/// Discrete progress event emitted during an indexing run
#[derive(Debug, Clone)]
pub struct IndexProgress {
    pub phase: IndexPhase,
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// Callback receiving progress events; owned by the orchestration layer
pub type ProgressSink<'a> = &'a mut dyn FnMut(IndexProgress);

/// Orchestrates incremental note indexing and embedding
pub struct Indexer<'a> {
    db: &'a Database,
    provider: &'a dyn EmbeddingProvider,
    batch_size: usize,
}

impl<'a> Indexer<'a> {
    pub fn new(db: &'a Database, provider: &'a dyn EmbeddingProvider) -> Self {
        Self {
            db,
            provider,
            batch_size: 50,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run an incremental indexing pass over the scanned notes.
    pub fn run(&self, notes: &[Note]) -> Result<IndexOutcome> {
        self.run_with_progress(notes, &mut |_| {})
    }

    /// Run an incremental indexing pass, emitting progress events.
    ///
    /// Steps: diff against stored records, look up the embedding cache by
    /// fingerprint, embed cache misses in batches, persist embeddings and
    /// note records, then drop records for paths no longer in the vault.
    /// Embedding results are keyed by fingerprint (never batch position),
    /// so retries or reordering cannot mis-associate vectors.
    pub fn run_with_progress(
        &self,
        notes: &[Note],
        progress: ProgressSink<'_>,
    ) -> Result<IndexOutcome> {
        let stored = self.db.all_notes()?;
        let stored_by_path: AHashMap<String, String> = stored
            .into_iter()
            .map(|r| (r.relative_path, r.fingerprint))
            .collect();
        let vault_paths: AHashSet<&str> =
            notes.iter().map(|n| n.relative_path.as_str()).collect();

        let (new_notes, changed_notes, unchanged) = diff_notes(notes, &stored_by_path);
        let deleted_paths: Vec<String> = stored_by_path
            .keys()
            .filter(|p| !vault_paths.contains(p.as_str()))
            .cloned()
            .collect();

        let to_index: Vec<&Note> = new_notes.iter().chain(changed_notes.iter()).copied().collect();

        progress(IndexProgress {
            phase: IndexPhase::Diffing,
            current: 0,
            total: to_index.len(),
            message: format!(
                "Found {} new, {} changed, {} deleted, {} unchanged",
                new_notes.len(),
                changed_notes.len(),
                deleted_paths.len(),
                unchanged
            ),
        });

        // Cache lookup by fingerprint. A rename shows up as "changed path"
        // but its content fingerprint already has a vector, so it is a hit.
        let fingerprints: Vec<String> =
            to_index.iter().map(|n| n.fingerprint.clone()).collect();
        let cached = self.db.cached_embeddings(&fingerprints)?;

        // Deduplicate misses by fingerprint so identical content in two
        // files is embedded once
        let mut seen = AHashSet::new();
        let to_embed: Vec<&Note> = to_index
            .iter()
            .filter(|n| !cached.contains_key(&n.fingerprint) && seen.insert(n.fingerprint.clone()))
            .copied()
            .collect();
        let embeddings_cached = to_index.len() - to_embed.len();

        tracing::info!(
            "Embedding cache: {} hit(s), {} miss(es)",
            embeddings_cached,
            to_embed.len()
        );

        let mut embeddings_computed = 0;
        for (batch_idx, batch) in to_embed.chunks(self.batch_size).enumerate() {
            let batch_start = batch_idx * self.batch_size;
            progress(IndexProgress {
                phase: IndexPhase::Embedding,
                current: batch_start,
                total: to_embed.len(),
                message: format!(
                    "Embedding notes {}-{} of {}",
                    batch_start + 1,
                    batch_start + batch.len(),
                    to_embed.len()
                ),
            });

            let texts: Vec<String> = batch
                .iter()
                .map(|n| prepare_for_embedding(&note_title(&n.relative_path), &n.content))
                .collect();
            let vectors = self.provider.embed_batch(&texts)?;

            let entries: Vec<(String, Vec<f32>)> = batch
                .iter()
                .map(|n| n.fingerprint.clone())
                .zip(vectors)
                .collect();
            embeddings_computed += self.db.save_embeddings(
                &entries,
                self.provider.model_name(),
                self.provider.dimension(),
            )?;
        }

        progress(IndexProgress {
            phase: IndexPhase::Storing,
            current: 0,
            total: to_index.len(),
            message: "Updating note index".to_string(),
        });

        for note in &to_index {
            self.db.upsert_note(&note.relative_path, &note.fingerprint)?;
        }
        if !deleted_paths.is_empty() {
            self.db.delete_notes(&deleted_paths)?;
        }

        let outcome = IndexOutcome {
            added: new_notes.len(),
            updated: changed_notes.len(),
            deleted: deleted_paths.len(),
            unchanged,
            embeddings_computed,
            embeddings_cached,
            total_indexed: self.db.count_notes()?,
        };

        tracing::info!(
            "Indexing complete: +{} ~{} -{} (={} total), {} embeddings computed, {} cached",
            outcome.added,
            outcome.updated,
            outcome.deleted,
            outcome.total_indexed,
            outcome.embeddings_computed,
            outcome.embeddings_cached
        );

        progress(IndexProgress {
            phase: IndexPhase::Complete,
            current: to_index.len(),
            total: to_index.len(),
            message: format!("Indexing complete: {} notes indexed", outcome.total_indexed),
        });

        Ok(outcome)
    }
}

/// Get the current index status for the scanned corpus without indexing.
/// Safe to call without an embedding provider.
pub fn index_status(db: &Database, notes: &[Note]) -> Result<IndexStatus> {
    let stored = db.all_notes()?;
    let stored_by_path: AHashMap<String, String> = stored
        .into_iter()
        .map(|r| (r.relative_path, r.fingerprint))
        .collect();

    let needing_indexing = notes
        .iter()
        .filter(|n| stored_by_path.get(&n.relative_path) != Some(&n.fingerprint))
        .count();

    Ok(IndexStatus {
        total_in_vault: notes.len(),
        indexed: stored_by_path.len(),
        needing_indexing,
    })
}

/// Classify vault notes as new, changed, or unchanged against stored state
fn diff_notes<'n>(
    notes: &'n [Note],
    stored_by_path: &AHashMap<String, String>,
) -> (Vec<&'n Note>, Vec<&'n Note>, usize) {
    let mut new_notes = Vec::new();
    let mut changed = Vec::new();
    let mut unchanged = 0;

    for note in notes {
        match stored_by_path.get(&note.relative_path) {
            None => new_notes.push(note),
            Some(stored_hash) if stored_hash != &note.fingerprint => changed.push(note),
            Some(_) => unchanged += 1,
        }
    }

    (new_notes, changed, unchanged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic provider counting how many texts it embeds
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn texts_embedded(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EmbeddingProvider for CountingProvider {
        // spelled out so it does not collide with the crate Result alias
        // pulled in by `use super::*`
        fn embed_batch(
            &self,
            texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0, 0.0])
                .collect())
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "counting-stub"
        }
    }

    #[test]
    fn test_initial_run_embeds_everything() {
        let db = Database::in_memory().unwrap();
        let provider = CountingProvider::new();
        let notes = vec![Note::new("a.md", "alpha"), Note::new("b.md", "beta")];

        let outcome = Indexer::new(&db, &provider).run(&notes).unwrap();
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.embeddings_computed, 2);
        assert_eq!(outcome.total_indexed, 2);
        assert_eq!(provider.texts_embedded(), 2);
    }

    #[test]
    fn test_rerun_is_incremental() {
        let db = Database::in_memory().unwrap();
        let provider = CountingProvider::new();
        let notes = vec![Note::new("a.md", "alpha"), Note::new("b.md", "beta")];

        let indexer = Indexer::new(&db, &provider);
        indexer.run(&notes).unwrap();

        let outcome = indexer.run(&notes).unwrap();
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.unchanged, 2);
        assert_eq!(outcome.embeddings_computed, 0);
        // Provider never invoked again for unchanged content
        assert_eq!(provider.texts_embedded(), 2);
    }

    #[test]
    fn test_rename_reuses_cached_embedding() {
        let db = Database::in_memory().unwrap();
        let provider = CountingProvider::new();
        let indexer = Indexer::new(&db, &provider);

        indexer.run(&[Note::new("old.md", "same content")]).unwrap();
        let outcome = indexer
            .run(&[Note::new("new.md", "same content")])
            .unwrap();

        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.embeddings_cached, 1);
        assert_eq!(outcome.embeddings_computed, 0);
        assert_eq!(provider.texts_embedded(), 1);
    }

    #[test]
    fn test_duplicate_content_embedded_once() {
        let db = Database::in_memory().unwrap();
        let provider = CountingProvider::new();
        let notes = vec![
            Note::new("a.md", "identical"),
            Note::new("b.md", "identical"),
        ];

        let outcome = Indexer::new(&db, &provider).run(&notes).unwrap();
        assert_eq!(outcome.embeddings_computed, 1);
        assert_eq!(provider.texts_embedded(), 1);
        assert_eq!(db.count_embeddings().unwrap(), 1);
    }

    #[test]
    fn test_changed_content_reembedded() {
        let db = Database::in_memory().unwrap();
        let provider = CountingProvider::new();
        let indexer = Indexer::new(&db, &provider);

        indexer.run(&[Note::new("a.md", "version one")]).unwrap();
        let outcome = indexer.run(&[Note::new("a.md", "version two")]).unwrap();

        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.embeddings_computed, 1);
        assert_eq!(db.count_embeddings().unwrap(), 2);
    }

    #[test]
    fn test_progress_events_emitted() {
        let db = Database::in_memory().unwrap();
        let provider = CountingProvider::new();
        let notes = vec![Note::new("a.md", "alpha")];

        let mut phases = Vec::new();
        Indexer::new(&db, &provider)
            .run_with_progress(&notes, &mut |p| phases.push(p.phase))
            .unwrap();

        assert_eq!(phases.first(), Some(&IndexPhase::Diffing));
        assert!(phases.contains(&IndexPhase::Embedding));
        assert!(phases.contains(&IndexPhase::Storing));
        assert_eq!(phases.last(), Some(&IndexPhase::Complete));
    }

    #[test]
    fn test_status_without_side_effects() {
        let db = Database::in_memory().unwrap();
        let provider = CountingProvider::new();
        let notes = vec![Note::new("a.md", "alpha"), Note::new("b.md", "beta")];

        let status = index_status(&db, &notes).unwrap();
        assert_eq!(
            status,
            IndexStatus {
                total_in_vault: 2,
                indexed: 0,
                needing_indexing: 2
            }
        );

        Indexer::new(&db, &provider).run(&notes).unwrap();

        let mut after = vec![notes[0].clone(), Note::new("b.md", "beta edited")];
        after.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        let status = index_status(&db, &after).unwrap();
        assert_eq!(status.needing_indexing, 1);
    }

    #[test]
    fn test_batching_splits_calls() {
        let db = Database::in_memory().unwrap();
        let provider = CountingProvider::new();
        let notes: Vec<Note> = (0..5)
            .map(|i| Note::new(format!("n{}.md", i), format!("note number {}", i)))
            .collect();

        let mut embed_events = 0;
        Indexer::new(&db, &provider)
            .with_batch_size(2)
            .run_with_progress(&notes, &mut |p| {
                if p.phase == IndexPhase::Embedding {
                    embed_events += 1;
                }
            })
            .unwrap();

        // 5 notes with batch size 2 -> 3 embedding batches
        assert_eq!(embed_events, 3);
        assert_eq!(provider.texts_embedded(), 5);
    }
}
