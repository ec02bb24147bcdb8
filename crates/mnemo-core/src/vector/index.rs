//! HNSW approximate nearest-neighbor index wrapping `usearch`.
//!
//! `usearch` indexes by `u64` only, so a `key_to_id`/`id_to_key` bridge
//! maps our string ids onto dense integer keys, and capacity must be
//! `reserve()`d before `add()` or usearch segfaults.

use super::{Result, VectorError};
use std::collections::HashMap;
use std::path::Path;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

const DEFAULT_CONNECTIVITY: usize = 16;
const DEFAULT_EXPANSION_ADD: usize = 128;
const DEFAULT_EXPANSION_SEARCH: usize = 64;

/// A single HNSW segment (one vector-store tier).
pub struct HnswIndex {
    index: Index,
    dimensions: usize,
    key_to_id: HashMap<String, u64>,
    id_to_key: HashMap<u64, String>,
    next_id: u64,
}

impl HnswIndex {
    pub fn new(dimensions: usize) -> Result<Self> {
        let options = IndexOptions {
            dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: DEFAULT_CONNECTIVITY,
            expansion_add: DEFAULT_EXPANSION_ADD,
            expansion_search: DEFAULT_EXPANSION_SEARCH,
            ..Default::default()
        };
        let index = Index::new(&options).map_err(|e| VectorError::IndexCreation(e.to_string()))?;
        index
            .reserve(1024)
            .map_err(|e| VectorError::IndexCreation(e.to_string()))?;
        Ok(Self {
            index,
            dimensions,
            key_to_id: HashMap::new(),
            id_to_key: HashMap::new(),
            next_id: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.key_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_to_id.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_to_id.contains_key(key)
    }

    /// Insert or update the vector for `key`. Updating removes the old
    /// entry first since usearch has no in-place update.
    pub fn add(&mut self, key: &str, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(VectorError::InvalidDimensions(self.dimensions, vector.len()));
        }

        if let Some(existing_id) = self.key_to_id.get(key).copied() {
            let _ = self.index.remove(existing_id);
            self.id_to_key.remove(&existing_id);
        }

        if self.index.size() + 1 > self.index.capacity() {
            let new_capacity = (self.index.capacity() * 2).max(1024);
            self.index
                .reserve(new_capacity)
                .map_err(|e| VectorError::IndexAdd(e.to_string()))?;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.index
            .add(id, vector)
            .map_err(|e| VectorError::IndexAdd(e.to_string()))?;
        self.key_to_id.insert(key.to_string(), id);
        self.id_to_key.insert(id, key.to_string());
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        let id = self
            .key_to_id
            .remove(key)
            .ok_or_else(|| VectorError::KeyNotFound(key.to_string()))?;
        self.id_to_key.remove(&id);
        self.index
            .remove(id)
            .map_err(|e| VectorError::IndexSearch(e.to_string()))?;
        Ok(())
    }

    /// Cosine-similarity search; usearch returns cosine *distance*, so
    /// similarity is `1.0 - distance`. Results are sorted by similarity
    /// descending then key ascending for a deterministic tie-break.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if query.len() != self.dimensions {
            return Err(VectorError::InvalidDimensions(self.dimensions, query.len()));
        }
        let matches = self
            .index
            .search(query, k)
            .map_err(|e| VectorError::IndexSearch(e.to_string()))?;

        let mut results: Vec<(String, f32)> = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .filter_map(|(id, dist)| {
                self.id_to_key.get(id).map(|key| (key.clone(), 1.0 - dist))
            })
            .collect();

        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(results)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.index
            .save(path.to_string_lossy().as_ref())
            .map_err(|e| VectorError::IndexPersistence(e.to_string()))?;
        let mappings = serde_json::json!({
            "key_to_id": self.key_to_id,
            "next_id": self.next_id,
        });
        let sidecar = path.with_extension("mappings.json");
        std::fs::write(sidecar, mappings.to_string())
            .map_err(|e| VectorError::IndexPersistence(e.to_string()))?;
        Ok(())
    }

    pub fn load(path: &Path, dimensions: usize) -> Result<Self> {
        let options = IndexOptions {
            dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: DEFAULT_CONNECTIVITY,
            expansion_add: DEFAULT_EXPANSION_ADD,
            expansion_search: DEFAULT_EXPANSION_SEARCH,
            ..Default::default()
        };
        let index = Index::new(&options).map_err(|e| VectorError::IndexCreation(e.to_string()))?;
        index
            .load(path.to_string_lossy().as_ref())
            .map_err(|e| VectorError::IndexPersistence(e.to_string()))?;

        let sidecar = path.with_extension("mappings.json");
        let raw = std::fs::read_to_string(&sidecar)
            .map_err(|e| VectorError::IndexPersistence(e.to_string()))?;
        let parsed: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| VectorError::IndexPersistence(e.to_string()))?;
        let key_to_id: HashMap<String, u64> = serde_json::from_value(
            parsed.get("key_to_id").cloned().unwrap_or_default(),
        )
        .map_err(|e| VectorError::IndexPersistence(e.to_string()))?;
        let next_id = parsed.get("next_id").and_then(|v| v.as_u64()).unwrap_or(0);
        let id_to_key = key_to_id.iter().map(|(k, v)| (*v, k.clone())).collect();

        Ok(Self {
            index,
            dimensions,
            key_to_id,
            id_to_key,
            next_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(seed: f32, dims: usize) -> Vec<f32> {
        let mut out = vec![0.0; dims];
        out[0] = seed;
        out[1] = 1.0;
        out
    }

    #[test]
    fn add_and_search_finds_closest() {
        let mut idx = HnswIndex::new(4).unwrap();
        idx.add("a", &v(1.0, 4)).unwrap();
        idx.add("b", &v(5.0, 4)).unwrap();
        let results = idx.search(&v(1.1, 4), 1).unwrap();
        assert_eq!(results[0].0, "a");
    }

    #[test]
    fn update_in_place_replaces_old_vector() {
        let mut idx = HnswIndex::new(4).unwrap();
        idx.add("a", &v(1.0, 4)).unwrap();
        idx.add("a", &v(9.0, 4)).unwrap();
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn remove_drops_key() {
        let mut idx = HnswIndex::new(4).unwrap();
        idx.add("a", &v(1.0, 4)).unwrap();
        idx.remove("a").unwrap();
        assert!(!idx.contains("a"));
    }

    #[test]
    fn invalid_dimensions_rejected() {
        let mut idx = HnswIndex::new(4).unwrap();
        let err = idx.add("a", &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, VectorError::InvalidDimensions(4, 2)));
    }
}
