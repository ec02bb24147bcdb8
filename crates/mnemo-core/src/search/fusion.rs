//! Score fusion primitives shared by the hybrid search engine and, during
//! a cognitive learning tick, by pattern scoring.
//!
//! `linear_combination` is a weighted-sum primitive, used here to blend
//! vector and graph scores.

#[derive(Debug, Clone, Copy)]
pub struct HybridSearchConfig {
    pub vector_weight: f32,
    pub rrf_k: f32,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            vector_weight: 0.6,
            rrf_k: 60.0,
        }
    }
}

/// Weighted sum of two scores already normalized to `[0.0, 1.0]`.
pub fn linear_combination(vector_score: f32, graph_score: f32, vector_weight: f32) -> f32 {
    let vector_weight = vector_weight.clamp(0.0, 1.0);
    vector_weight * vector_score + (1.0 - vector_weight) * graph_score
}

/// Reciprocal rank fusion across any number of ranked id lists, for callers
/// that have ranks rather than comparable scores (e.g. fusing a keyword
/// search rank with a vector search rank).
pub fn reciprocal_rank_fusion(rankings: &[Vec<String>], k: f32) -> Vec<(String, f32)> {
    use std::collections::HashMap;
    let mut scores: HashMap<String, f32> = HashMap::new();
    for ranking in rankings {
        for (rank, id) in ranking.iter().enumerate() {
            *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k + rank as f32 + 1.0);
        }
    }
    let mut out: Vec<(String, f32)> = scores.into_iter().collect();
    out.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_combination_weights_correctly() {
        assert!((linear_combination(1.0, 0.0, 0.7) - 0.7).abs() < 1e-6);
        assert!((linear_combination(0.0, 1.0, 0.7) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn rrf_rewards_items_ranked_highly_in_multiple_lists() {
        let rankings = vec![
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec!["b".to_string(), "a".to_string(), "c".to_string()],
        ];
        let fused = reciprocal_rank_fusion(&rankings, 60.0);
        assert!(fused[0].0 == "a" || fused[0].0 == "b");
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn rrf_breaks_ties_by_id() {
        let rankings = vec![vec!["z".to_string(), "a".to_string()]];
        let fused = reciprocal_rank_fusion(&rankings, 60.0);
        assert_eq!(fused[0].0, "z");
    }
}
