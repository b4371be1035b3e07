//! In-memory BM25 lexical index
//!
//! Rebuilt in full on every indexing run; never persisted. Supports the
//! pairwise scoring needed for candidate generation by treating each
//! document's own token multiset as a query against the whole corpus.

use ahash::AHashMap;

const BM25_K1: f32 = 1.5;
const BM25_B: f32 = 0.75;

/// BM25 inverted index over a fixed set of documents
pub struct Bm25Index {
    /// term -> (doc index, term frequency) postings
    postings: AHashMap<String, Vec<(usize, u32)>>,
    /// per-document term frequencies, for use as queries
    doc_terms: Vec<AHashMap<String, u32>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f32,
    num_docs: usize,
}

impl Bm25Index {
    /// Build an index over the given documents. Empty documents are
    /// tolerated; they simply score zero against everything.
    pub fn new(texts: &[String]) -> Self {
        let num_docs = texts.len();
        let mut postings: AHashMap<String, Vec<(usize, u32)>> = AHashMap::new();
        let mut doc_terms = Vec::with_capacity(num_docs);
        let mut doc_lens = Vec::with_capacity(num_docs);

        for (doc_idx, text) in texts.iter().enumerate() {
            let tokens = tokenize(text);
            doc_lens.push(tokens.len());

            let mut freqs: AHashMap<String, u32> = AHashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for (term, tf) in &freqs {
                postings
                    .entry(term.clone())
                    .or_default()
                    .push((doc_idx, *tf));
            }
            doc_terms.push(freqs);
        }

        let total_len: usize = doc_lens.iter().sum();
        let avg_doc_len = if num_docs > 0 {
            total_len as f32 / num_docs as f32
        } else {
            0.0
        };

        tracing::debug!(
            "Built BM25 index: {} documents, {} distinct terms",
            num_docs,
            postings.len()
        );

        Self {
            postings,
            doc_terms,
            doc_lens,
            avg_doc_len,
            num_docs,
        }
    }

    /// Number of indexed documents
    pub fn num_documents(&self) -> usize {
        self.num_docs
    }

    /// Compute the full N x N matrix of pairwise BM25 scores.
    ///
    /// `scores[i][j]` is the relevance of document `j` when document `i`
    /// is the query. The diagonal (self-score) is forced to zero. Rows for
    /// documents sharing no terms with anything else come out all zero.
    pub fn pairwise_scores(&self) -> Vec<Vec<f32>> {
        let n = self.num_docs;
        let mut matrix = vec![vec![0.0f32; n]; n];

        for query_idx in 0..n {
            for term in self.doc_terms[query_idx].keys() {
                let Some(posting) = self.postings.get(term) else {
                    continue;
                };
                let idf = self.idf(posting.len());
                for &(doc_idx, tf) in posting {
                    if doc_idx == query_idx {
                        continue;
                    }
                    matrix[query_idx][doc_idx] += idf * self.tf_component(tf, doc_idx);
                }
            }
        }

        matrix
    }

    /// Okapi idf with the +1 inside the log so scores never go negative
    fn idf(&self, doc_freq: usize) -> f32 {
        let n = self.num_docs as f32;
        let df = doc_freq as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn tf_component(&self, tf: u32, doc_idx: usize) -> f32 {
        let tf = tf as f32;
        let doc_len = self.doc_lens[doc_idx] as f32;
        let length_norm = 1.0 - BM25_B + BM25_B * doc_len / self.avg_doc_len.max(1.0);
        tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * length_norm)
    }
}

/// Lowercased Unicode alphanumeric runs; everything else is a separator.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(texts: &[&str]) -> Bm25Index {
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        Bm25Index::new(&owned)
    }

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("Hello, World! rust-lang 2024"),
            vec!["hello", "world", "rust", "lang", "2024"]
        );
    }

    #[test]
    fn test_diagonal_is_zero() {
        let index = index_of(&["apple banana", "banana cherry", "cherry apple"]);
        let scores = index.pairwise_scores();
        for (i, row) in scores.iter().enumerate() {
            assert_eq!(row[i], 0.0);
        }
    }

    #[test]
    fn test_shared_terms_score_higher() {
        let index = index_of(&[
            "rust ownership borrowing lifetimes rust",
            "rust ownership memory safety",
            "gardening tomatoes compost soil",
        ]);
        let scores = index.pairwise_scores();
        // Doc 0 and 1 share terms; doc 2 shares nothing
        assert!(scores[0][1] > scores[0][2]);
        assert!(scores[1][0] > scores[1][2]);
        assert_eq!(scores[0][2], 0.0);
    }

    #[test]
    fn test_empty_document_tolerated() {
        let index = index_of(&["content words here", ""]);
        let scores = index.pairwise_scores();
        assert_eq!(scores[1][0], 0.0);
        assert_eq!(scores[0][1], 0.0);
    }

    #[test]
    fn test_matrix_dimensions() {
        let index = index_of(&["a", "b", "c", "d"]);
        let scores = index.pairwise_scores();
        assert_eq!(scores.len(), 4);
        assert!(scores.iter().all(|row| row.len() == 4));
    }

    #[test]
    fn test_scores_nonnegative() {
        let index = index_of(&["the quick brown fox", "the lazy dog", "the the the"]);
        let scores = index.pairwise_scores();
        for row in &scores {
            for &s in row {
                assert!(s >= 0.0);
            }
        }
    }

    #[test]
    fn test_single_document_corpus() {
        let index = index_of(&["only one"]);
        let scores = index.pairwise_scores();
        assert_eq!(scores, vec![vec![0.0]]);
    }
}
