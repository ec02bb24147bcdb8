//! Shared helpers for the end-to-end test suite: every test builds its own
//! in-memory [`UnifiedMemory`] so tests never share state.

use mnemo_core::{HashingEmbeddingProvider, MemoryConfig, UnifiedMemory};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DIMENSIONS: usize = 256;

pub fn memory() -> UnifiedMemory {
    UnifiedMemory::new(MemoryConfig::in_memory(), Arc::new(HashingEmbeddingProvider::new(DIMENSIONS))).unwrap()
}

pub fn cancel() -> CancellationToken {
    CancellationToken::new()
}
