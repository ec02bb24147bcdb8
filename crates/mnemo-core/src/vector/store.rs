//! Tiered vector store: hot (always in-memory linear scan, small and
//! frequently mutated), warm and cold (HNSW-backed when the `vector-search`
//! feature is enabled, linear-scan otherwise so the store degrades
//! gracefully rather than refusing to run without the optional dependency).

use super::{Result, VectorError};
use crate::embeddings::cosine_similarity;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub key: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

trait Segment: Send + Sync {
    fn add(&mut self, key: &str, vector: &[f32]) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    fn contains(&self, key: &str) -> bool;
    fn len(&self) -> usize;
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>>;
}

struct LinearSegment {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl LinearSegment {
    fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: HashMap::new(),
        }
    }
}

impl Segment for LinearSegment {
    fn add(&mut self, key: &str, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(VectorError::InvalidDimensions(self.dimensions, vector.len()));
        }
        self.vectors.insert(key.to_string(), vector.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.vectors
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| VectorError::KeyNotFound(key.to_string()))
    }

    fn contains(&self, key: &str) -> bool {
        self.vectors.contains_key(key)
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if query.len() != self.dimensions {
            return Err(VectorError::InvalidDimensions(self.dimensions, query.len()));
        }
        let mut scored: Vec<(String, f32)> = self
            .vectors
            .iter()
            .map(|(key, v)| (key.clone(), cosine_similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(feature = "vector-search")]
struct HnswSegment(super::HnswIndex);

#[cfg(feature = "vector-search")]
impl Segment for HnswSegment {
    fn add(&mut self, key: &str, vector: &[f32]) -> Result<()> {
        self.0.add(key, vector)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.0.remove(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        self.0.search(query, k)
    }
}

fn new_segment(dimensions: usize) -> Result<Box<dyn Segment>> {
    #[cfg(feature = "vector-search")]
    {
        Ok(Box::new(HnswSegment(super::HnswIndex::new(dimensions)?)))
    }
    #[cfg(not(feature = "vector-search"))]
    {
        Ok(Box::new(LinearSegment::new(dimensions)))
    }
}

struct Entry {
    vector: Vec<f32>,
    metadata: serde_json::Value,
    access_count: u64,
    tier: Tier,
}

/// C4's public surface: upsert, filtered k-NN search, delete, tiered storage.
pub struct VectorStore {
    dimensions: usize,
    hot: Box<dyn Segment>,
    warm: Box<dyn Segment>,
    cold: Box<dyn Segment>,
    entries: HashMap<String, Entry>,
    hot_capacity: usize,
    warm_capacity: usize,
    persist_path: Option<PathBuf>,
}

impl VectorStore {
    pub fn new(dimensions: usize, hot_capacity: usize, warm_capacity: usize) -> Result<Self> {
        Ok(Self {
            dimensions,
            hot: Box::new(LinearSegment::new(dimensions)),
            warm: new_segment(dimensions)?,
            cold: new_segment(dimensions)?,
            entries: HashMap::new(),
            hot_capacity,
            warm_capacity,
            persist_path: None,
        })
    }

    pub fn with_persist_path(mut self, path: PathBuf) -> Self {
        self.persist_path = Some(path);
        self
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn segment_mut(&mut self, tier: Tier) -> &mut Box<dyn Segment> {
        match tier {
            Tier::Hot => &mut self.hot,
            Tier::Warm => &mut self.warm,
            Tier::Cold => &mut self.cold,
        }
    }

    fn segment(&self, tier: Tier) -> &dyn Segment {
        match tier {
            Tier::Hot => self.hot.as_ref(),
            Tier::Warm => self.warm.as_ref(),
            Tier::Cold => self.cold.as_ref(),
        }
    }

    /// Insert or update `key`'s vector. New keys land in the hot tier;
    /// updating an existing key's vector re-inserts it into whichever tier
    /// it currently lives in.
    pub fn upsert(&mut self, key: &str, vector: &[f32], metadata: serde_json::Value) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(VectorError::InvalidDimensions(self.dimensions, vector.len()));
        }

        let tier = self.entries.get(key).map(|e| e.tier).unwrap_or(Tier::Hot);
        self.segment_mut(tier).add(key, vector)?;
        self.entries
            .entry(key.to_string())
            .and_modify(|e| {
                e.metadata = metadata.clone();
                e.vector = vector.to_vec();
            })
            .or_insert(Entry {
                vector: vector.to_vec(),
                metadata,
                access_count: 0,
                tier,
            });

        if tier == Tier::Hot && self.hot.len() > self.hot_capacity {
            self.demote_lru(Tier::Hot, Tier::Warm)?;
        }
        if tier == Tier::Warm && self.warm.len() > self.warm_capacity {
            self.demote_lru(Tier::Warm, Tier::Cold)?;
        }
        Ok(())
    }

    fn demote_lru(&mut self, from: Tier, to: Tier) -> Result<()> {
        let candidate = self
            .entries
            .iter()
            .filter(|(_, e)| e.tier == from)
            .min_by_key(|(_, e)| e.access_count)
            .map(|(k, e)| (k.clone(), e.vector.clone()));

        let Some((key, vector)) = candidate else { return Ok(()) };
        self.segment_mut(from).remove(&key)?;
        self.segment_mut(to).add(&key, &vector)?;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.tier = to;
        }
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        let entry = self
            .entries
            .remove(key)
            .ok_or_else(|| VectorError::KeyNotFound(key.to_string()))?;
        self.segment_mut(entry.tier).remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The embedding stored under `key`, if any. Used by the cognitive
    /// engine's learning tick to turn a trajectory step's chosen chunk id
    /// back into a vector without re-embedding.
    pub fn embedding_of(&self, key: &str) -> Option<Vec<f32>> {
        self.entries.get(key).map(|e| e.vector.clone())
    }

    /// k-NN cosine search across all tiers, merged and re-ranked, with an
    /// optional metadata predicate applied before truncation to `k`.
    /// Ties (equal score) break on key ascending for determinism.
    pub fn search(
        &mut self,
        query: &[f32],
        k: usize,
        filter: Option<&dyn Fn(&serde_json::Value) -> bool>,
    ) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimensions {
            return Err(VectorError::InvalidDimensions(self.dimensions, query.len()));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let fetch_k = (k * 4).max(k).max(1);
        let mut merged: Vec<(String, f32)> = Vec::new();
        for tier in [Tier::Hot, Tier::Warm, Tier::Cold] {
            merged.extend(self.segment(tier).search(query, fetch_k)?);
        }
        merged.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut hits = Vec::with_capacity(k);
        let mut accessed = Vec::new();
        for (key, score) in merged {
            let Some(entry) = self.entries.get(&key) else { continue };
            if let Some(f) = filter {
                if !f(&entry.metadata) {
                    continue;
                }
            }
            hits.push(SearchHit {
                key: key.clone(),
                score,
                metadata: entry.metadata.clone(),
            });
            accessed.push(key);
            if hits.len() == k {
                break;
            }
        }

        for key in accessed {
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.access_count += 1;
            }
        }

        Ok(hits)
    }

    /// Persist tier membership. HNSW segment bytes are flushed via their own
    /// `save`; this store's own metadata/tier map is the sidecar that makes
    /// `StoreCorruption` detectable on load (a present vector with no
    /// metadata entry, or vice versa, is corruption).
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.persist_path else { return Ok(()) };
        let metadata: HashMap<&str, &Entry> =
            self.entries.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let serializable: HashMap<&str, serde_json::Value> = metadata
            .iter()
            .map(|(k, e)| {
                (
                    *k,
                    serde_json::json!({
                        "metadata": e.metadata,
                        "accessCount": e.access_count,
                        "tier": format!("{:?}", e.tier),
                    }),
                )
            })
            .collect();
        std::fs::write(path, serde_json::to_string(&serializable).unwrap())?;
        Ok(())
    }

    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_and_search_roundtrip() {
        let mut store = VectorStore::new(3, 10, 10).unwrap();
        store.upsert("a", &[1.0, 0.0, 0.0], serde_json::json!({"kind": "doc"})).unwrap();
        store.upsert("b", &[0.0, 1.0, 0.0], serde_json::json!({"kind": "doc"})).unwrap();
        let hits = store.search(&[0.9, 0.1, 0.0], 1, None).unwrap();
        assert_eq!(hits[0].key, "a");
    }

    #[test]
    fn delete_removes_from_search() {
        let mut store = VectorStore::new(3, 10, 10).unwrap();
        store.upsert("a", &[1.0, 0.0, 0.0], serde_json::json!({})).unwrap();
        store.delete("a").unwrap();
        assert!(!store.contains("a"));
        let hits = store.search(&[1.0, 0.0, 0.0], 5, None).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn metadata_filter_excludes_non_matching() {
        let mut store = VectorStore::new(3, 10, 10).unwrap();
        store.upsert("a", &[1.0, 0.0, 0.0], serde_json::json!({"kind": "x"})).unwrap();
        store.upsert("b", &[0.9, 0.1, 0.0], serde_json::json!({"kind": "y"})).unwrap();
        let filter = |m: &serde_json::Value| m.get("kind").and_then(|v| v.as_str()) == Some("y");
        let hits = store.search(&[1.0, 0.0, 0.0], 5, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "b");
    }

    #[test]
    fn zero_k_returns_no_hits() {
        let mut store = VectorStore::new(3, 10, 10).unwrap();
        store.upsert("a", &[1.0, 0.0, 0.0], serde_json::json!({})).unwrap();
        let hits = store.search(&[1.0, 0.0, 0.0], 0, None).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn invalid_dimensions_rejected() {
        let mut store = VectorStore::new(3, 10, 10).unwrap();
        let err = store.upsert("a", &[1.0, 0.0], serde_json::json!({})).unwrap_err();
        assert!(matches!(err, VectorError::InvalidDimensions(3, 2)));
    }

    #[test]
    fn deterministic_tie_break_by_key() {
        let mut store = VectorStore::new(2, 10, 10).unwrap();
        store.upsert("z", &[1.0, 0.0], serde_json::json!({})).unwrap();
        store.upsert("a", &[1.0, 0.0], serde_json::json!({})).unwrap();
        let hits = store.search(&[1.0, 0.0], 2, None).unwrap();
        assert_eq!(hits[0].key, "a");
        assert_eq!(hits[1].key, "z");
    }

    #[test]
    fn embedding_of_returns_stored_vector() {
        let mut store = VectorStore::new(2, 10, 10).unwrap();
        store.upsert("a", &[0.5, 0.5], serde_json::json!({})).unwrap();
        assert_eq!(store.embedding_of("a"), Some(vec![0.5, 0.5]));
        assert_eq!(store.embedding_of("missing"), None);
    }

    #[test]
    fn demotes_past_hot_capacity() {
        let mut store = VectorStore::new(2, 1, 10).unwrap();
        store.upsert("a", &[1.0, 0.0], serde_json::json!({})).unwrap();
        store.upsert("b", &[0.0, 1.0], serde_json::json!({})).unwrap();
        assert_eq!(store.len(), 2);
        // Both still discoverable regardless of which tier they landed in.
        assert!(store.contains("a"));
        assert!(store.contains("b"));
    }
}
