//! Candidate pair generation
//!
//! Orchestrates the hybrid similarity pipeline: cosine similarity over
//! cached embeddings, BM25 over prepared note text, per-note rank
//! matrices, and Reciprocal Rank Fusion. Pairs already resolved by mutual
//! links or a still-valid decision are filtered out before ranking.

use crate::error::Result;
use crate::lexical::Bm25Index;
use crate::markdown::{mutual_link_pairs, note_title, prepare_for_embedding};
use crate::similarity::{cosine_matrix, rank_matrix, rrf_score, RRF_K};
use crate::storage::{Database, PairKey};
use crate::vault::Note;
use ahash::AHashMap;

/// Two notes identified as potentially related.
///
/// Carries both per-direction scores (A->B and B->A) and the fused RRF
/// score used for final ranking.
#[derive(Debug, Clone)]
pub struct CandidatePair {
    pub path_a: String,
    pub path_b: String,
    /// Cosine similarity between embeddings (symmetric)
    pub semantic_similarity: f32,
    /// Rank of B in A's semantic ranking (1-based)
    pub semantic_rank_a_to_b: usize,
    /// Rank of A in B's semantic ranking (1-based)
    pub semantic_rank_b_to_a: usize,
    /// BM25 score of B when A is the query
    pub lexical_score_a_to_b: f32,
    /// BM25 score of A when B is the query
    pub lexical_score_b_to_a: f32,
    pub lexical_rank_a_to_b: usize,
    pub lexical_rank_b_to_a: usize,
    /// Fused score: max of the two directional RRF values
    pub rrf_score: f64,
}

impl CandidatePair {
    /// Canonical sorted key for this pair, identical for (A,B) and (B,A)
    pub fn pair_key(&self) -> PairKey {
        if self.path_a <= self.path_b {
            (self.path_a.clone(), self.path_b.clone())
        } else {
            (self.path_b.clone(), self.path_a.clone())
        }
    }

    /// Human-readable explanation of why this pair was suggested
    pub fn explanation(&self) -> String {
        let best_bm25 = self.lexical_score_a_to_b.max(self.lexical_score_b_to_a);
        format!(
            "Semantic similarity: {:.2} | BM25 score: {:.1} | RRF score: {:.4}",
            self.semantic_similarity, best_bm25, self.rrf_score
        )
    }
}

/// Generates ranked candidate pairs from the current corpus state
pub struct CandidateGenerator<'a> {
    db: &'a Database,
    rrf_k: usize,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db, rrf_k: RRF_K }
    }

    /// Override the RRF damping constant (defaults to 60)
    pub fn with_rrf_k(mut self, k: usize) -> Self {
        self.rrf_k = k;
        self
    }

    /// Generate candidate pairs for the scanned corpus, sorted by fused
    /// RRF score descending.
    ///
    /// Every unordered pair of notes with a cached embedding is scored
    /// (full pairwise computation; corpus sizes in scope keep this
    /// sub-second). A pair is excluded when the two notes already link to
    /// each other in their `## Related` sections, or when a decision
    /// recorded against their current fingerprints exists. Callers may
    /// re-filter the returned list per target note.
    pub fn generate(&self, notes: &[Note]) -> Result<Vec<CandidatePair>> {
        if notes.len() < 2 {
            tracing::info!("Fewer than 2 notes in corpus, no candidates to generate");
            return Ok(Vec::new());
        }

        // Only notes with a cached embedding participate; anything else
        // has not completed an indexing pass yet.
        let all_embeddings = self.db.all_embeddings()?;
        let indexed: Vec<&Note> = notes
            .iter()
            .filter(|n| all_embeddings.contains_key(&n.fingerprint))
            .collect();

        let n = indexed.len();
        if n < 2 {
            tracing::info!("Fewer than 2 notes with embeddings, no candidates");
            return Ok(Vec::new());
        }

        tracing::info!("Generating candidates for {} notes", n);

        let embeddings: Vec<Vec<f32>> = indexed
            .iter()
            .map(|note| all_embeddings[&note.fingerprint].clone())
            .collect();

        let texts: Vec<String> = indexed
            .iter()
            .map(|note| prepare_for_embedding(&note_title(&note.relative_path), &note.content))
            .collect();
        let bm25 = Bm25Index::new(&texts);

        let semantic_matrix = cosine_matrix(&embeddings);
        let lexical_matrix = bm25.pairwise_scores();

        let mut candidates =
            self.fuse_pairs(&indexed, &semantic_matrix, &lexical_matrix);

        let linked = mutual_link_pairs(
            indexed
                .iter()
                .map(|note| (note.relative_path.as_str(), note.content.as_str())),
        );
        let before_link_filter = candidates.len();
        candidates.retain(|c| !linked.contains(&c.pair_key()));
        let link_filtered = before_link_filter - candidates.len();

        let current_fingerprints: AHashMap<String, String> = indexed
            .iter()
            .map(|note| (note.relative_path.clone(), note.fingerprint.clone()))
            .collect();
        let decided = self.db.valid_decisions(&current_fingerprints)?;
        let before_decision_filter = candidates.len();
        candidates.retain(|c| !decided.contains(&c.pair_key()));
        let decision_filtered = before_decision_filter - candidates.len();

        // Fused score descending; pair key as tie-break for determinism
        candidates.sort_by(|a, b| {
            b.rrf_score
                .partial_cmp(&a.rrf_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.pair_key().cmp(&b.pair_key()))
        });

        tracing::info!(
            "Candidate generation complete: {} candidates ({} filtered by links, {} by decisions)",
            candidates.len(),
            link_filtered,
            decision_filtered
        );

        Ok(candidates)
    }

    /// Score every unordered pair with RRF from both directions, taking
    /// the maximum. Lexical scoring is asymmetric, so a max (not an
    /// average) avoids penalising a pair for one side's weaker match.
    fn fuse_pairs(
        &self,
        notes: &[&Note],
        semantic_matrix: &[Vec<f32>],
        lexical_matrix: &[Vec<f32>],
    ) -> Vec<CandidatePair> {
        let n = notes.len();
        let semantic_ranks = rank_matrix(semantic_matrix);
        let lexical_ranks = rank_matrix(lexical_matrix);

        let mut candidates = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                let rrf_i_to_j =
                    rrf_score(semantic_ranks[i][j], lexical_ranks[i][j], self.rrf_k);
                let rrf_j_to_i =
                    rrf_score(semantic_ranks[j][i], lexical_ranks[j][i], self.rrf_k);

                candidates.push(CandidatePair {
                    path_a: notes[i].relative_path.clone(),
                    path_b: notes[j].relative_path.clone(),
                    semantic_similarity: semantic_matrix[i][j],
                    semantic_rank_a_to_b: semantic_ranks[i][j],
                    semantic_rank_b_to_a: semantic_ranks[j][i],
                    lexical_score_a_to_b: lexical_matrix[i][j],
                    lexical_score_b_to_a: lexical_matrix[j][i],
                    lexical_rank_a_to_b: lexical_ranks[i][j],
                    lexical_rank_b_to_a: lexical_ranks[j][i],
                    rrf_score: rrf_i_to_j.max(rrf_j_to_i),
                });
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Verdict;

    fn seed_note(db: &Database, path: &str, content: &str, vector: Vec<f32>) -> Note {
        let note = Note::new(path, content);
        db.upsert_note(&note.relative_path, &note.fingerprint)
            .unwrap();
        db.save_embeddings(&[(note.fingerprint.clone(), vector)], "test", 3)
            .unwrap();
        note
    }

    #[test]
    fn test_empty_and_single_note_corpus() {
        let db = Database::in_memory().unwrap();
        let generator = CandidateGenerator::new(&db);

        assert!(generator.generate(&[]).unwrap().is_empty());

        let solo = seed_note(&db, "solo.md", "alone", vec![1.0, 0.0, 0.0]);
        assert!(generator.generate(&[solo]).unwrap().is_empty());
    }

    #[test]
    fn test_pair_key_is_canonical() {
        let pair = CandidatePair {
            path_a: "z.md".to_string(),
            path_b: "a.md".to_string(),
            semantic_similarity: 0.5,
            semantic_rank_a_to_b: 1,
            semantic_rank_b_to_a: 1,
            lexical_score_a_to_b: 0.0,
            lexical_score_b_to_a: 0.0,
            lexical_rank_a_to_b: 1,
            lexical_rank_b_to_a: 1,
            rrf_score: 0.03,
        };
        assert_eq!(pair.pair_key(), ("a.md".to_string(), "z.md".to_string()));
    }

    #[test]
    fn test_all_pairs_scored() {
        let db = Database::in_memory().unwrap();
        let notes = vec![
            seed_note(&db, "a.md", "alpha text", vec![1.0, 0.0, 0.0]),
            seed_note(&db, "b.md", "beta text", vec![0.0, 1.0, 0.0]),
            seed_note(&db, "c.md", "gamma text", vec![0.0, 0.0, 1.0]),
        ];

        let candidates = CandidateGenerator::new(&db).generate(&notes).unwrap();
        // 3 notes -> 3 unordered pairs
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn test_identical_content_no_crash() {
        let db = Database::in_memory().unwrap();
        // Same content -> same fingerprint -> one shared embedding
        let a = seed_note(&db, "a.md", "identical words here", vec![0.5, 0.5, 0.5]);
        let b = seed_note(&db, "b.md", "identical words here", vec![0.5, 0.5, 0.5]);

        let candidates = CandidateGenerator::new(&db).generate(&[a, b]).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].semantic_similarity - 1.0).abs() < 1e-5);
        assert!(candidates[0].rrf_score.is_finite());
    }

    #[test]
    fn test_mutually_linked_pair_excluded() {
        let db = Database::in_memory().unwrap();
        let a = seed_note(
            &db,
            "a.md",
            "shared topic words\n\n## Related\n\n- [B](<b.md>)\n",
            vec![1.0, 0.0, 0.0],
        );
        let b = seed_note(
            &db,
            "b.md",
            "shared topic words\n\n## Related\n\n- [A](<a.md>)\n",
            vec![1.0, 0.1, 0.0],
        );

        let candidates = CandidateGenerator::new(&db).generate(&[a, b]).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_one_directional_link_not_excluded() {
        let db = Database::in_memory().unwrap();
        let a = seed_note(
            &db,
            "a.md",
            "words\n\n## Related\n\n- [B](<b.md>)\n",
            vec![1.0, 0.0, 0.0],
        );
        let b = seed_note(&db, "b.md", "words", vec![1.0, 0.1, 0.0]);

        let candidates = CandidateGenerator::new(&db).generate(&[a, b]).unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_decided_pair_excluded_until_stale() {
        let db = Database::in_memory().unwrap();
        let a = seed_note(&db, "a.md", "topic one", vec![1.0, 0.0, 0.0]);
        let b = seed_note(&db, "b.md", "topic two", vec![0.9, 0.1, 0.0]);

        db.save_decision("a.md", "b.md", Verdict::No, &a.fingerprint, &b.fingerprint)
            .unwrap();

        let generator = CandidateGenerator::new(&db);
        assert!(generator.generate(&[a.clone(), b.clone()]).unwrap().is_empty());

        // Edit note a: the decision goes stale and the pair reappears
        let edited = seed_note(&db, "a.md", "topic one, revised", vec![1.0, 0.05, 0.0]);
        let candidates = generator.generate(&[edited, b]).unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_fusion_symmetric_in_note_order() {
        let db = Database::in_memory().unwrap();
        let a = seed_note(&db, "a.md", "rust ownership", vec![1.0, 0.0, 0.2]);
        let b = seed_note(&db, "b.md", "rust borrowing", vec![0.8, 0.2, 0.2]);
        let c = seed_note(&db, "c.md", "gardening soil", vec![0.0, 1.0, 0.0]);

        let generator = CandidateGenerator::new(&db);
        let forward = generator.generate(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let reversed = generator.generate(&[c, b, a]).unwrap();

        let score_of = |candidates: &[CandidatePair], key: (&str, &str)| -> f64 {
            candidates
                .iter()
                .find(|c| c.pair_key() == (key.0.to_string(), key.1.to_string()))
                .map(|c| c.rrf_score)
                .unwrap()
        };

        for key in [("a.md", "b.md"), ("a.md", "c.md"), ("b.md", "c.md")] {
            assert_eq!(score_of(&forward, key), score_of(&reversed, key));
        }
    }

    #[test]
    fn test_sorted_by_fused_score_descending() {
        let db = Database::in_memory().unwrap();
        let notes = vec![
            seed_note(&db, "a.md", "rust memory safety ownership", vec![1.0, 0.0, 0.0]),
            seed_note(&db, "b.md", "rust memory safety borrow", vec![0.95, 0.05, 0.0]),
            seed_note(&db, "c.md", "cooking pasta recipes", vec![0.0, 1.0, 0.0]),
        ];

        let candidates = CandidateGenerator::new(&db).generate(&notes).unwrap();
        for window in candidates.windows(2) {
            assert!(window[0].rrf_score >= window[1].rrf_score);
        }
        assert_eq!(
            candidates[0].pair_key(),
            ("a.md".to_string(), "b.md".to_string())
        );
    }

    #[test]
    fn test_explanation_mentions_scores() {
        let db = Database::in_memory().unwrap();
        let a = seed_note(&db, "a.md", "words in common", vec![1.0, 0.0, 0.0]);
        let b = seed_note(&db, "b.md", "words in common", vec![1.0, 0.0, 0.0]);

        let candidates = CandidateGenerator::new(&db).generate(&[a, b]).unwrap();
        let explanation = candidates[0].explanation();
        assert!(explanation.contains("Semantic similarity"));
        assert!(explanation.contains("BM25"));
        assert!(explanation.contains("RRF"));
    }
}
