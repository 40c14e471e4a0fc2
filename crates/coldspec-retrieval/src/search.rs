//! Hybrid search primitives: an in-memory cosine vector index, a BM25
//! keyword index, and Reciprocal Rank Fusion.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use tracing::debug;

use coldspec_core::ChunkId;

lazy_static! {
    static ref STOPWORDS: HashSet<&'static str> = [
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has",
        "had", "do", "does", "did", "will", "would", "could", "should", "may", "might",
        "shall", "can", "of", "in", "to", "for", "with", "on", "at", "by", "from", "it",
        "its", "this", "that", "and", "or", "but", "not", "no", "what", "which", "who",
        "how", "when", "where",
    ]
    .into_iter()
    .collect();
}

/// Lowercase alphanumeric tokens with stopwords removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 2 && !STOPWORDS.contains(token))
        .map(String::from)
        .collect()
}

/// Cosine similarity over equal-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

/// Brute-force cosine index over chunk embeddings. Chunks without an
/// embedding simply never enter the index; they remain reachable through
/// the keyword side.
#[derive(Default)]
pub struct VectorIndex {
    entries: Vec<(ChunkId, Vec<f32>)>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ChunkId, embedding: Vec<f32>) {
        self.entries.push((id, embedding));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-k by cosine similarity, restricted to `allowed` when given.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        allowed: Option<&HashSet<ChunkId>>,
    ) -> Vec<(ChunkId, f32)> {
        let mut scored: Vec<(ChunkId, f32)> = self
            .entries
            .iter()
            .filter(|(id, _)| allowed.map(|set| set.contains(id)).unwrap_or(true))
            .map(|(id, embedding)| (*id, cosine_similarity(query, embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

/// BM25 keyword index over chunk content.
pub struct KeywordIndex {
    k1: f32,
    b: f32,
    inverted: HashMap<String, Vec<(ChunkId, usize)>>,
    doc_lengths: HashMap<ChunkId, usize>,
    total_length: usize,
}

impl Default for KeywordIndex {
    fn default() -> Self {
        Self::new(1.2, 0.75)
    }
}

impl KeywordIndex {
    pub fn new(k1: f32, b: f32) -> Self {
        Self {
            k1,
            b,
            inverted: HashMap::new(),
            doc_lengths: HashMap::new(),
            total_length: 0,
        }
    }

    pub fn insert(&mut self, id: ChunkId, content: &str) {
        let tokens = tokenize(content);
        let length = tokens.len();

        let mut frequencies: HashMap<String, usize> = HashMap::new();
        for token in tokens {
            *frequencies.entry(token).or_default() += 1;
        }
        for (term, freq) in frequencies {
            self.inverted.entry(term).or_default().push((id, freq));
        }
        self.doc_lengths.insert(id, length);
        self.total_length += length;
    }

    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    fn idf(&self, term: &str) -> f32 {
        let doc_freq = self.inverted.get(term).map(|v| v.len()).unwrap_or(0);
        if doc_freq == 0 {
            return 0.0;
        }
        let n = self.doc_lengths.len() as f32;
        let df = doc_freq as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Top-k BM25 matches, restricted to `allowed` when given.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        allowed: Option<&HashSet<ChunkId>>,
    ) -> Vec<(ChunkId, f32)> {
        if self.doc_lengths.is_empty() {
            return Vec::new();
        }
        let avg_length = (self.total_length as f32 / self.doc_lengths.len() as f32).max(1.0);
        let mut scores: HashMap<ChunkId, f32> = HashMap::new();

        for term in tokenize(query) {
            let idf = self.idf(&term);
            if idf == 0.0 {
                continue;
            }
            if let Some(postings) = self.inverted.get(&term) {
                for (id, freq) in postings {
                    if let Some(set) = allowed {
                        if !set.contains(id) {
                            continue;
                        }
                    }
                    let doc_length = *self.doc_lengths.get(id).unwrap_or(&1) as f32;
                    let tf = *freq as f32;
                    let numerator = tf * (self.k1 + 1.0);
                    let denominator =
                        tf + self.k1 * (1.0 - self.b + self.b * (doc_length / avg_length));
                    *scores.entry(*id).or_default() += idf * (numerator / denominator);
                }
            }
        }

        let mut results: Vec<(ChunkId, f32)> = scores.into_iter().collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        results
    }
}

/// One fused result.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub chunk_id: ChunkId,
    pub score: f64,
    pub vector_rank: Option<usize>,
    pub keyword_rank: Option<usize>,
}

impl FusedHit {
    /// A hit surfaced by both sub-rankings.
    pub fn is_dual_source(&self) -> bool {
        self.vector_rank.is_some() && self.keyword_rank.is_some()
    }
}

/// Reciprocal Rank Fusion: `score(d) = Σ 1/(k + rank_d)` across both
/// rankings, rank starting at 1. Ties order deterministically by chunk id
/// so the fused ranking is stable under permutation of tied inputs.
pub fn reciprocal_rank_fusion(
    vector_ranked: &[(ChunkId, f32)],
    keyword_ranked: &[(ChunkId, f32)],
    k: usize,
) -> Vec<FusedHit> {
    let mut hits: HashMap<ChunkId, FusedHit> = HashMap::new();

    for (rank, (id, _)) in vector_ranked.iter().enumerate() {
        let entry = hits.entry(*id).or_insert_with(|| FusedHit {
            chunk_id: *id,
            score: 0.0,
            vector_rank: None,
            keyword_rank: None,
        });
        entry.score += 1.0 / (k + rank + 1) as f64;
        entry.vector_rank = Some(rank);
    }
    for (rank, (id, _)) in keyword_ranked.iter().enumerate() {
        let entry = hits.entry(*id).or_insert_with(|| FusedHit {
            chunk_id: *id,
            score: 0.0,
            vector_rank: None,
            keyword_rank: None,
        });
        entry.score += 1.0 / (k + rank + 1) as f64;
        entry.keyword_rank = Some(rank);
    }

    let mut fused: Vec<FusedHit> = hits.into_values().collect();
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    debug!(results = fused.len(), "Rankings fused");
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<ChunkId> {
        (0..n).map(|_| ChunkId::new()).collect()
    }

    #[test]
    fn test_tokenize_drops_stopwords() {
        let tokens = tokenize("What is the storage capacity of the ABT-HC-26S?");
        assert!(tokens.contains(&"storage".to_string()));
        assert!(tokens.contains(&"capacity".to_string()));
        assert!(tokens.contains(&"abt".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"of".to_string()));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_vector_index_ranks_by_similarity() {
        let ids = ids(3);
        let mut index = VectorIndex::new();
        index.insert(ids[0], vec![1.0, 0.0]);
        index.insert(ids[1], vec![0.7, 0.7]);
        index.insert(ids[2], vec![0.0, 1.0]);

        let results = index.search(&[1.0, 0.0], 3, None);
        assert_eq!(results[0].0, ids[0]);
        assert_eq!(results[2].0, ids[2]);
    }

    #[test]
    fn test_keyword_index_bm25() {
        let ids = ids(3);
        let mut index = KeywordIndex::default();
        index.insert(ids[0], "storage capacity 26 cubic feet refrigerator");
        index.insert(ids[1], "compressor warranty five years");
        index.insert(ids[2], "capacity of the freezer compartment");

        let results = index.search("storage capacity", 3, None);
        assert!(!results.is_empty());
        assert_eq!(results[0].0, ids[0]);
        assert!(!results.iter().any(|(id, _)| *id == ids[1]));
    }

    #[test]
    fn test_allowed_filter() {
        let ids = ids(2);
        let mut index = KeywordIndex::default();
        index.insert(ids[0], "capacity twenty six");
        index.insert(ids[1], "capacity forty nine");

        let allowed: HashSet<ChunkId> = [ids[1]].into_iter().collect();
        let results = index.search("capacity", 5, Some(&allowed));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, ids[1]);
    }

    #[test]
    fn test_rrf_first_in_both_is_first_fused() {
        let ids = ids(3);
        let vector = vec![(ids[0], 0.9), (ids[1], 0.5), (ids[2], 0.2)];
        let keyword = vec![(ids[0], 8.0), (ids[2], 3.0), (ids[1], 1.0)];

        let fused = reciprocal_rank_fusion(&vector, &keyword, 60);
        assert_eq!(fused[0].chunk_id, ids[0]);
        assert!(fused[0].is_dual_source());
        assert!(fused[0].score > fused[1].score);
    }

    #[test]
    fn test_rrf_stable_under_tied_input_permutation() {
        let ids = ids(2);
        // Each chunk appears in exactly one ranking at rank 1: tied scores.
        let fused_a = reciprocal_rank_fusion(&[(ids[0], 0.9)], &[(ids[1], 5.0)], 60);
        let fused_b = reciprocal_rank_fusion(&[(ids[1], 0.9)], &[(ids[0], 5.0)], 60);

        let order_a: Vec<ChunkId> = fused_a.iter().map(|h| h.chunk_id).collect();
        let order_b: Vec<ChunkId> = fused_b.iter().map(|h| h.chunk_id).collect();
        assert_eq!(order_a, order_b);
    }

    #[test]
    fn test_rrf_score_formula() {
        let ids = ids(1);
        let fused = reciprocal_rank_fusion(&[(ids[0], 1.0)], &[(ids[0], 1.0)], 60);
        let expected = 2.0 / 61.0;
        assert!((fused[0].score - expected).abs() < 1e-9);
    }
}
