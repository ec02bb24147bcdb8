//! Cognitive Engine (C7): trajectory recording, bounded pattern learning,
//! and neural reranking.
//!
//! A bounded in-memory collection with an explicit state machine and
//! decay-driven eviction, here applied to query/result patterns rather
//! than a generic scored collection.

pub mod patterns;
pub mod rerank;

pub use patterns::{PatternStore, ScoredPattern};
pub use rerank::{RerankCandidate, RerankError, Reranker};

use crate::model::{Trajectory, TrajectoryStep};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

/// Cognitive engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Disabled,
    Idle,
    Recording,
    Learning,
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CognitiveError {
    #[error("cognitive engine is disabled")]
    Disabled,
    #[error("no open trajectory with id {0}")]
    NoSuchTrajectory(String),
    #[error("trajectory {0} is already closed")]
    AlreadyClosed(String),
    #[error("rerank unavailable: {0}")]
    RerankUnavailable(#[from] RerankError),
}

pub type Result<T> = std::result::Result<T, CognitiveError>;

/// Recording + learning substrate shared by the hybrid search engine. One
/// instance is owned per [`crate::memory::UnifiedMemory`].
pub struct CognitiveEngine {
    state: EngineState,
    open: HashMap<String, Trajectory>,
    closed: Vec<Trajectory>,
    patterns: PatternStore,
    reranker: Reranker,
    max_buffered_trajectories: usize,
}

impl CognitiveEngine {
    pub fn new(max_buffered_trajectories: usize, max_patterns: usize, reranker: Reranker) -> Self {
        Self {
            state: EngineState::Idle,
            open: HashMap::new(),
            closed: Vec::new(),
            patterns: PatternStore::new(max_patterns),
            reranker,
            max_buffered_trajectories,
        }
    }

    pub fn disabled() -> Self {
        Self {
            state: EngineState::Disabled,
            open: HashMap::new(),
            closed: Vec::new(),
            patterns: PatternStore::new(0),
            reranker: Reranker::unavailable(),
            max_buffered_trajectories: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Start recording a new trajectory, returning its id.
    pub fn begin(&mut self) -> Result<String> {
        if self.state == EngineState::Disabled {
            return Err(CognitiveError::Disabled);
        }
        let id = Uuid::new_v4().to_string();
        self.open.insert(
            id.clone(),
            Trajectory {
                id: id.clone(),
                steps: Vec::new(),
                reward: None,
                started_at: Utc::now(),
                ended_at: None,
            },
        );
        self.state = EngineState::Recording;
        Ok(id)
    }

    /// Record one query/outcome step on an open trajectory.
    pub fn step(
        &mut self,
        trajectory_id: &str,
        query: String,
        candidate_ids: Vec<String>,
        chosen_id: Option<String>,
        score: f32,
    ) -> Result<()> {
        if self.state == EngineState::Disabled {
            return Err(CognitiveError::Disabled);
        }
        let trajectory = self
            .open
            .get_mut(trajectory_id)
            .ok_or_else(|| CognitiveError::NoSuchTrajectory(trajectory_id.to_string()))?;
        trajectory.steps.push(TrajectoryStep {
            query,
            candidate_ids,
            chosen_id,
            score,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Close a trajectory with a final reward in `[-1.0, 1.0]`, moving it
    /// into the bounded buffer a learning tick consumes from. When the
    /// buffer overflows, the oldest closed trajectory is dropped.
    pub fn end(&mut self, trajectory_id: &str, reward: f32) -> Result<()> {
        if self.state == EngineState::Disabled {
            return Err(CognitiveError::Disabled);
        }
        let mut trajectory = self
            .open
            .remove(trajectory_id)
            .ok_or_else(|| CognitiveError::NoSuchTrajectory(trajectory_id.to_string()))?;
        trajectory.reward = Some(reward.clamp(-1.0, 1.0));
        trajectory.ended_at = Some(Utc::now());
        self.closed.push(trajectory);
        if self.closed.len() > self.max_buffered_trajectories {
            self.closed.remove(0);
        }
        if self.open.is_empty() {
            self.state = EngineState::Idle;
        }
        Ok(())
    }

    /// Distill buffered closed trajectories into learned patterns, draining
    /// the buffer. Each step's chosen-chunk embedding is approximated by the
    /// caller-supplied `embedding_of` lookup (typically backed by the
    /// vector store), since trajectories only record ids. Per trajectory,
    /// steps are folded into a single reward-weighted, L2-normalized
    /// embedding before being observed — one pattern update per trajectory,
    /// not one per step.
    pub fn tick(&mut self, embedding_of: impl Fn(&str) -> Option<Vec<f32>>) -> Result<usize> {
        if self.state == EngineState::Disabled {
            return Err(CognitiveError::Disabled);
        }
        self.state = EngineState::Learning;
        let drained: Vec<Trajectory> = self.closed.drain(..).collect();
        let mut learned = 0;
        for trajectory in &drained {
            let mut weighted_sum: Option<Vec<f32>> = None;
            let mut reward_total = 0.0f32;
            let mut reward_count = 0usize;
            for step in &trajectory.steps {
                let Some(chosen) = &step.chosen_id else { continue };
                let Some(embedding) = embedding_of(chosen) else { continue };
                reward_total += step.score;
                reward_count += 1;
                match &mut weighted_sum {
                    Some(sum) => {
                        for (s, e) in sum.iter_mut().zip(embedding.iter()) {
                            *s += e * step.score;
                        }
                    }
                    None => {
                        weighted_sum = Some(embedding.iter().map(|e| e * step.score).collect());
                    }
                }
            }
            let Some(sum) = weighted_sum else { continue };
            let norm = sum.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm == 0.0 {
                continue;
            }
            let normalized: Vec<f32> = sum.iter().map(|v| v / norm).collect();
            let avg_reward = reward_total / reward_count as f32;
            self.patterns.observe(normalized, avg_reward);
            learned += 1;
        }
        self.state = if self.open.is_empty() { EngineState::Idle } else { EngineState::Recording };
        Ok(learned)
    }

    /// Force a learning tick regardless of how many trajectories are
    /// buffered (normally a tick is scheduled after the buffer fills).
    pub fn force_learn(&mut self, embedding_of: impl Fn(&str) -> Option<Vec<f32>>) -> Result<usize> {
        self.tick(embedding_of)
    }

    pub fn find_patterns(&self, query_embedding: &[f32], k: usize) -> Vec<patterns::ScoredPattern> {
        self.patterns.nearest(query_embedding, k)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn open_trajectory_count(&self) -> usize {
        self.open.len()
    }

    pub fn has_cross_encoder(&self) -> bool {
        self.reranker.has_cross_encoder()
    }

    /// Rerank candidates; propagates [`RerankError::Unavailable`] rather
    /// than silently falling back when the caller explicitly asked for
    /// reranking.
    pub async fn rerank(&self, query: &str, candidates: Vec<RerankCandidate>) -> Result<Vec<RerankCandidate>> {
        self.reranker.rerank(query, candidates).await.map_err(Into::into)
    }
}
