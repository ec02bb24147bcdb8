//! A deterministic, model-free embedding provider.
//!
//! Hashes character trigrams into a fixed-width vector (the "hashing trick"),
//! so the system is fully operable without downloading or running a neural
//! model: no network access, no ONNX runtime, identical output for identical
//! input across machines and runs.

use super::{cosine_similarity, EmbeddingError, EmbeddingProvider, Embedding};
use async_trait::async_trait;

/// Hashes overlapping character trigrams of the (lowercased, whitespace
/// collapsed) input text into `dimensions` buckets, sign-folded the way
/// feature hashing avoids systematic collisions (Weinberger et al., 2009).
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn normalize_text(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    fn hash_ngram(ngram: &str) -> u64 {
        // FNV-1a, chosen for being dependency-free and stable across builds.
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in ngram.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let normalized = Self::normalize_text(text);
        let mut v = vec![0.0f32; self.dimensions];
        if normalized.is_empty() {
            return v;
        }

        let chars: Vec<char> = normalized.chars().collect();
        let n = 3usize.min(chars.len().max(1));
        if chars.len() < n {
            let ngram: String = chars.iter().collect();
            let h = Self::hash_ngram(&ngram);
            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        } else {
            for window in chars.windows(n) {
                let ngram: String = window.iter().collect();
                let h = Self::hash_ngram(&ngram);
                let bucket = (h % self.dimensions as u64) as usize;
                let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
                v[bucket] += sign;
            }
        }

        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        // Empty or whitespace-only text is a valid (if useless) query: it
        // vectorizes to all zeros, which `normalize` leaves untouched rather
        // than dividing by a zero norm. Returning it here rather than
        // erroring keeps `EmbeddingUnavailable` reserved for an actually
        // unavailable provider, not a caller-supplied blank string.
        let mut embedding = Embedding::new(self.vectorize(text));
        embedding.normalize();
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hashing-trigram-v1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_across_calls() {
        let provider = HashingEmbeddingProvider::new(64);
        let a = provider.embed("the quick brown fox").await.unwrap();
        let b = provider.embed("the quick brown fox").await.unwrap();
        assert_eq!(a.vector, b.vector);
    }

    #[tokio::test]
    async fn normalized_whitespace_is_equivalent() {
        let provider = HashingEmbeddingProvider::new(64);
        let a = provider.embed("Hello   World").await.unwrap();
        let b = provider.embed("hello world").await.unwrap();
        assert_eq!(a.vector, b.vector);
    }

    #[tokio::test]
    async fn similar_text_scores_higher_than_unrelated() {
        let provider = HashingEmbeddingProvider::new(256);
        let a = provider.embed("cats are great pets").await.unwrap();
        let b = provider.embed("cats make great pets").await.unwrap();
        let c = provider.embed("quarterly revenue report").await.unwrap();
        assert!(cosine_similarity(&a.vector, &b.vector) > cosine_similarity(&a.vector, &c.vector));
    }

    #[tokio::test]
    async fn empty_input_returns_zero_vector() {
        let provider = HashingEmbeddingProvider::new(32);
        let embedding = provider.embed("   ").await.unwrap();
        assert!(embedding.vector.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn output_is_unit_normalized() {
        let provider = HashingEmbeddingProvider::new(64);
        let e = provider.embed("some arbitrary text").await.unwrap();
        assert!(e.is_normalized());
    }
}
