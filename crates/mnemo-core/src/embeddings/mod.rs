//! Embedding Provider (C1): deterministic `text -> fixed-dim unit vector`,
//! batched and cached.
//!
//! Two implementations ship: [`HashingEmbeddingProvider`], always available
//! and fully reproducible, and, behind the `embeddings` feature,
//! [`local::FastEmbedProvider`] wrapping local ONNX inference. Both
//! implement the same [`EmbeddingProvider`] trait so the rest of the crate
//! never needs to know which one is in play.

mod hashing;
#[cfg(feature = "embeddings")]
mod local;

pub use hashing::HashingEmbeddingProvider;
#[cfg(feature = "embeddings")]
pub use local::FastEmbedProvider;

use async_trait::async_trait;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Embedding error types.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    #[error("model initialization failed: {0}")]
    ModelInit(String),
    #[error("embedding generation failed: {0}")]
    EmbeddingFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// A semantic embedding vector, always expected to be L2-normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub dimensions: usize,
}

impl Embedding {
    pub fn new(vector: Vec<f32>) -> Self {
        let dimensions = vector.len();
        Self { vector, dimensions }
    }

    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.dimensions != other.dimensions {
            return 0.0;
        }
        cosine_similarity(&self.vector, &other.vector)
    }

    pub fn normalize(&mut self) {
        let norm = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut self.vector {
                *x /= norm;
            }
        }
    }

    pub fn is_normalized(&self) -> bool {
        let norm = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        (norm - 1.0).abs() < 0.001
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        let vector = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Some(Self::new(vector))
    }
}

/// Truncate a vector to `dims` dimensions and re-normalize, assuming a
/// Matryoshka-trained source model where the leading dimensions are
/// themselves a valid lower-dimensional embedding.
#[inline]
pub fn matryoshka_truncate(mut vector: Vec<f32>, dims: usize) -> Vec<f32> {
    if vector.len() > dims {
        vector.truncate(dims);
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 { dot / denom } else { 0.0 }
}

/// Capability trait every embedding source implements; batched and async so
/// a remote or GPU-bound provider can suspend without blocking the runtime.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Embed a batch of texts; providers may override this for a real batch
    /// call, the default embeds sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }

    /// Output dimensionality this provider produces.
    fn dimensions(&self) -> usize;

    /// Stable model identifier for provenance/logging.
    fn model_name(&self) -> &str;
}

/// Wraps any [`EmbeddingProvider`] with an LRU cache keyed on normalized
/// text, so repeated queries skip re-embedding.
pub struct CachedEmbeddingProvider<P: EmbeddingProvider> {
    inner: P,
    cache: Mutex<lru::LruCache<String, Embedding>>,
}

impl<P: EmbeddingProvider> CachedEmbeddingProvider<P> {
    pub fn new(inner: P, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(lru::LruCache::new(capacity)),
        }
    }

    fn cache_key(text: &str) -> String {
        text.trim().to_lowercase()
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbeddingProvider<P> {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let key = Self::cache_key(text);
        if let Some(hit) = self.cache.lock().unwrap().get(&key) {
            return Ok(hit.clone());
        }
        let embedding = self.inner.embed(text).await?;
        self.cache.lock().unwrap().put(key, embedding.clone());
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
