//! Runtime configuration.
//!
//! Resolves a default on-disk location via [`directories::ProjectDirs`] with
//! an environment-variable escape hatch, rather than requiring callers to
//! hand-build a config struct for the common case.

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the memory core. Not an invariant surface: every field here
/// has a reasonable default and changing it cannot violate a correctness
/// property, only a cost/quality tradeoff.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Where the graph store's SQLite file and vector tiers live. `None`
    /// selects an in-memory-only store (used by tests).
    pub store_path: Option<PathBuf>,

    /// Dimensionality every embedding in this instance is truncated/padded
    /// to. Must match whatever embedding provider is configured.
    pub embedding_dimensions: usize,

    /// Capacity of the hot vector tier before items are demoted to warm.
    pub hot_tier_capacity: usize,

    /// Capacity of the warm vector tier before items are demoted to cold.
    pub warm_tier_capacity: usize,

    /// Reciprocal-rank-fusion constant `k` (only used by the optional RRF
    /// fusion helper; the primary fusion path uses a weighted sum instead).
    pub rrf_k: f32,

    /// Default `vectorWeight` for hybrid search when the caller doesn't
    /// supply one.
    pub default_vector_weight: f32,

    /// Maximum number of trajectories the cognitive engine buffers before a
    /// learning tick is forced.
    pub max_buffered_trajectories: usize,

    /// Maximum number of learned patterns retained at once.
    pub max_patterns: usize,

    /// Default per-operation timeout.
    pub operation_timeout: Duration,

    /// Pyramid alignment formula weights (direct fit, graph coherence,
    /// ancestor chain), passed to [`crate::pyramid::calculate_alignment`].
    /// Expected to sum to 1.0; an instance that doesn't just produces scores
    /// outside the usual `[0, 1]` clamp boundary rather than failing.
    pub pyramid_weights: (f32, f32, f32),
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            embedding_dimensions: 256,
            hot_tier_capacity: 2_000,
            warm_tier_capacity: 50_000,
            rrf_k: 60.0,
            default_vector_weight: 0.6,
            max_buffered_trajectories: 256,
            max_patterns: 1_000,
            operation_timeout: Duration::from_secs(30),
            pyramid_weights: (0.5, 0.2, 0.3),
        }
    }
}

impl MemoryConfig {
    /// Build a config from environment variables, falling back to
    /// [`Default::default`] for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(path) = std::env::var("MNEMO_STORE_PATH") {
            cfg.store_path = Some(PathBuf::from(path));
        } else if let Some(dirs) = directories::ProjectDirs::from("dev", "mnemo", "core") {
            cfg.store_path = Some(dirs.data_dir().join("store.db"));
        }

        if let Ok(v) = std::env::var("MNEMO_EMBEDDING_DIMENSIONS") {
            if let Ok(n) = v.parse() {
                cfg.embedding_dimensions = n;
            }
        }
        if let Ok(v) = std::env::var("MNEMO_VECTOR_WEIGHT") {
            if let Ok(n) = v.parse() {
                cfg.default_vector_weight = n;
            }
        }
        if let Ok(v) = std::env::var("MNEMO_OPERATION_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                cfg.operation_timeout = Duration::from_secs(n);
            }
        }

        cfg
    }

    /// An in-memory configuration with no persisted state, used by tests and
    /// short-lived embedded instances.
    pub fn in_memory() -> Self {
        Self {
            store_path: None,
            ..Self::default()
        }
    }
}
