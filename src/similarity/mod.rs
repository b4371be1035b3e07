//! Pairwise similarity matrices and ranking
//!
//! Converts raw embedding vectors and lexical scores into the per-document
//! rank matrices consumed by Reciprocal Rank Fusion.

mod fusion;

pub use fusion::{rrf_score, RRF_K};

/// Compute the pairwise cosine similarity matrix for a set of embeddings.
///
/// Returns an N x N symmetric matrix; `matrix[i][j]` is the cosine
/// similarity between vectors `i` and `j`, in [-1, 1]. Zero-norm vectors
/// are floored at a tiny epsilon so identical or empty content never
/// divides by zero. The diagonal is 1.0 and is ignored by ranking.
pub fn cosine_matrix(embeddings: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let n = embeddings.len();

    // Normalise each vector to unit length once, then similarity is a dot
    // product.
    let normalised: Vec<Vec<f32>> = embeddings
        .iter()
        .map(|v| {
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-10);
            v.iter().map(|x| x / norm).collect()
        })
        .collect();

    let mut matrix = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let dot: f32 = normalised[i]
                .iter()
                .zip(normalised[j].iter())
                .map(|(a, b)| a * b)
                .sum();
            matrix[i][j] = dot;
            matrix[j][i] = dot;
        }
    }
    matrix
}

/// Convert an N x N score matrix into an N x N matrix of 1-based dense ranks.
///
/// For each row, ranks are computed among the non-self entries: the highest
/// score gets rank 1 and equal scores share a rank (dense ranking), which
/// keeps the result deterministic for tied scores. The diagonal is 0.
pub fn rank_matrix(scores: &[Vec<f32>]) -> Vec<Vec<usize>> {
    let n = scores.len();
    let mut ranks = vec![vec![0usize; n]; n];

    for i in 0..n {
        let other_indices: Vec<usize> = (0..n).filter(|&j| j != i).collect();
        let other_scores: Vec<f32> = other_indices.iter().map(|&j| scores[i][j]).collect();
        let row_ranks = dense_ranks(&other_scores);
        for (pos, &j) in other_indices.iter().enumerate() {
            ranks[i][j] = row_ranks[pos];
        }
    }
    ranks
}

/// 1-based dense ranks over raw scores (highest score = rank 1, ties share).
fn dense_ranks(scores: &[f32]) -> Vec<usize> {
    if scores.is_empty() {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    // Descending by score; index as secondary key so the sort is total
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut ranks = vec![0usize; scores.len()];
    let mut current_rank = 1;
    for (pos, &idx) in order.iter().enumerate() {
        if pos > 0 && scores[idx] < scores[order[pos - 1]] {
            current_rank += 1;
        }
        ranks[idx] = current_rank;
    }
    ranks
}
