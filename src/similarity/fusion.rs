//! Reciprocal Rank Fusion for combining semantic and lexical rankings

/// Standard RRF damping constant. Higher k compresses the influence of
/// low-ranked results.
pub const RRF_K: usize = 60;

/// Compute the Reciprocal Rank Fusion score for one direction of a pair.
///
/// Formula: `1/(k + semantic_rank) + 1/(k + lexical_rank)` with 1-based
/// ranks. Robust to the differing score scales of the two signals because
/// only ranks enter the formula.
pub fn rrf_score(semantic_rank: usize, lexical_rank: usize, k: usize) -> f64 {
    debug_assert!(semantic_rank >= 1, "semantic rank must be 1-based");
    debug_assert!(lexical_rank >= 1, "lexical rank must be 1-based");

    1.0 / (k + semantic_rank) as f64 + 1.0 / (k + lexical_rank) as f64
}
