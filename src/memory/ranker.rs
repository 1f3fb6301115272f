//! Ranker - Semantic similarity over a message corpus
//!
//! The store delegates all relevance scoring to a `Ranker`. Which
//! implementation gets injected is decided once at construction time, so the
//! store itself never branches on "is the index available".

/// Ranks corpus entries by similarity to a query.
///
/// `rank` returns `(corpus_index, score)` pairs in descending score order.
/// Implementations must tolerate an empty corpus and an empty query.
pub trait Ranker {
    /// Whether this ranker can produce results at all. A `false` here puts
    /// the store into fallback mode: every search returns empty.
    fn is_ready(&self) -> bool;

    fn rank(&self, query: &str, corpus: &[&str]) -> Vec<(usize, f32)>;
}

/// Embedding-based ranker using hashed bag-of-words vectors and cosine
/// similarity.
///
/// This is a lightweight stand-in for a model-backed embedding index: good
/// enough for keyword-ish recall over a local chat history, and the trait
/// seam is exactly where a real embedding model would plug in.
pub struct EmbeddingRanker {
    dim: usize,
}

impl EmbeddingRanker {
    pub fn new(dim: usize) -> Self {
        // A zero-dimensional space can't hold anything
        Self { dim: dim.max(1) }
    }

    /// Hash each lowercased word into a fixed-size vector, then normalize
    fn embed(&self, text: &str) -> Vec<f32> {
        let text_lower = text.to_lowercase();
        let mut embedding = vec![0.0f32; self.dim];

        for word in text_lower.split_whitespace() {
            let idx = (hash_string(word) % self.dim as u64) as usize;
            embedding[idx] += 1.0;
        }

        let magnitude = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in embedding.iter_mut() {
                *val /= magnitude;
            }
        }

        embedding
    }
}

impl Default for EmbeddingRanker {
    fn default() -> Self {
        Self::new(128)
    }
}

impl Ranker for EmbeddingRanker {
    fn is_ready(&self) -> bool {
        true
    }

    fn rank(&self, query: &str, corpus: &[&str]) -> Vec<(usize, f32)> {
        let query_embedding = self.embed(query);

        let mut scored: Vec<(usize, f32)> = corpus
            .iter()
            .enumerate()
            .map(|(i, text)| (i, cosine_similarity(&query_embedding, &self.embed(text))))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }
}

/// A ranker that is never ready and never returns results.
///
/// Injecting this is how a deployment without an embedding capability runs:
/// the store degrades to "no search" instead of failing.
pub struct NoopRanker;

impl Ranker for NoopRanker {
    fn is_ready(&self) -> bool {
        false
    }

    fn rank(&self, _query: &str, _corpus: &[&str]) -> Vec<(usize, f32)> {
        Vec::new()
    }
}

fn hash_string(s: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
