//! Bounded pattern store: nearest-neighbor merge/insert/evict over
//! [`crate::model::LearnedPattern`]s.
//!
//! A capacity-limited set of scored entries where a new observation either
//! reinforces an existing entry (moving-average the centroid, bump
//! frequency, update a reward EMA) or is inserted fresh, evicting the
//! least-recently-reinforced entry when full.

use crate::embeddings::cosine_similarity;
use crate::model::LearnedPattern;
use chrono::Utc;
use uuid::Uuid;

/// How close an observation's embedding must be to an existing pattern's
/// centroid (cosine similarity) to be treated as reinforcing it rather than
/// creating a new pattern.
const MERGE_THRESHOLD: f32 = 0.92;
const REWARD_EMA_ALPHA: f32 = 0.2;

#[derive(Debug, Clone)]
pub struct ScoredPattern {
    pub pattern: LearnedPattern,
    pub similarity: f32,
}

pub struct PatternStore {
    patterns: Vec<LearnedPattern>,
    capacity: usize,
}

impl PatternStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            patterns: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Merge an observed (embedding, reward) pair into the nearest existing
    /// pattern, or insert a new one, evicting the pattern with the oldest
    /// `last_reinforced_at` when at capacity.
    pub fn observe(&mut self, embedding: Vec<f32>, reward: f32) {
        if self.capacity == 0 {
            return;
        }

        let best = self
            .patterns
            .iter()
            .enumerate()
            .map(|(i, p)| (i, cosine_similarity(&p.centroid, &embedding)))
            .filter(|(_, sim)| *sim >= MERGE_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((idx, _)) = best {
            let pattern = &mut self.patterns[idx];
            let n = pattern.frequency as f32;
            for (c, e) in pattern.centroid.iter_mut().zip(embedding.iter()) {
                *c = (*c * n + e) / (n + 1.0);
            }
            pattern.frequency += 1;
            pattern.reward_ema = REWARD_EMA_ALPHA * reward + (1.0 - REWARD_EMA_ALPHA) * pattern.reward_ema;
            pattern.last_reinforced_at = Utc::now();
            return;
        }

        if self.patterns.len() >= self.capacity {
            if let Some((evict_idx, _)) = self
                .patterns
                .iter()
                .enumerate()
                .min_by_key(|(_, p)| p.last_reinforced_at)
            {
                self.patterns.remove(evict_idx);
            }
        }

        let now = Utc::now();
        self.patterns.push(LearnedPattern {
            id: Uuid::new_v4().to_string(),
            centroid: embedding,
            frequency: 1,
            reward_ema: reward,
            created_at: now,
            last_reinforced_at: now,
        });
    }

    /// The `k` patterns whose centroid is most similar to `query_embedding`.
    pub fn nearest(&self, query_embedding: &[f32], k: usize) -> Vec<ScoredPattern> {
        let mut scored: Vec<ScoredPattern> = self
            .patterns
            .iter()
            .map(|p| ScoredPattern {
                pattern: p.clone(),
                similarity: cosine_similarity(&p.centroid, query_embedding),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.pattern.id.cmp(&b.pattern.id))
        });
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_inserts_a_pattern() {
        let mut store = PatternStore::new(4);
        store.observe(vec![1.0, 0.0], 0.5);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn similar_observation_merges_instead_of_inserting() {
        let mut store = PatternStore::new(4);
        store.observe(vec![1.0, 0.0], 0.5);
        store.observe(vec![1.0, 0.0001], 0.5);
        assert_eq!(store.len(), 1);
        assert_eq!(store.patterns[0].frequency, 2);
    }

    #[test]
    fn dissimilar_observation_inserts_a_new_pattern() {
        let mut store = PatternStore::new(4);
        store.observe(vec![1.0, 0.0], 0.5);
        store.observe(vec![0.0, 1.0], 0.5);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn capacity_overflow_evicts_oldest_reinforced() {
        let mut store = PatternStore::new(1);
        store.observe(vec![1.0, 0.0], 0.5);
        store.observe(vec![0.0, 1.0], 0.5);
        assert_eq!(store.len(), 1);
        assert_eq!(store.patterns[0].centroid, vec![0.0, 1.0]);
    }

    #[test]
    fn zero_capacity_store_ignores_observations() {
        let mut store = PatternStore::new(0);
        store.observe(vec![1.0, 0.0], 0.5);
        assert!(store.is_empty());
    }

    #[test]
    fn nearest_orders_by_similarity_descending() {
        let mut store = PatternStore::new(4);
        store.observe(vec![1.0, 0.0], 0.5);
        store.observe(vec![0.0, 1.0], 0.5);
        let results = store.nearest(&[0.9, 0.1], 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].pattern.centroid, vec![1.0, 0.0]);
    }
}
