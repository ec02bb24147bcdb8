//! Local semantic embeddings via `fastembed` (ONNX inference, no network
//! calls once the model is cached).
//!
//! Model: nomic-embed-text-v1.5 (768d, 8192 token context, Matryoshka
//! Representation Learning support) truncated to [`MemoryConfig::embedding_dimensions`]
//! — the leading N dimensions of a Matryoshka-trained model's output ARE a
//! valid N-dimensional embedding, so truncation plus re-normalization loses
//! only a few points of MTEB quality in exchange for 3x smaller storage.

use super::{matryoshka_truncate, EmbeddingError, EmbeddingProvider, Embedding};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Mutex, OnceLock};

pub const MAX_TEXT_LENGTH: usize = 8192;
pub const BATCH_SIZE: usize = 32;

static EMBEDDING_MODEL_RESULT: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

/// Resolve the fastembed model cache directory: `FASTEMBED_CACHE_PATH` env
/// var first, then the platform cache directory, then the home directory.
fn get_cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
        return std::path::PathBuf::from(path);
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("dev", "mnemo", "core") {
        return proj_dirs.cache_dir().join("fastembed");
    }
    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".cache/mnemo/fastembed");
    }
    std::path::PathBuf::from(".fastembed_cache")
}

fn get_model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>, EmbeddingError> {
    let result = EMBEDDING_MODEL_RESULT.get_or_init(|| {
        let cache_dir = get_cache_dir();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            tracing::warn!("failed to create embedding cache directory {:?}: {}", cache_dir, e);
        }

        let options = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
            .with_show_download_progress(true)
            .with_cache_dir(cache_dir);

        TextEmbedding::try_new(options).map(Mutex::new).map_err(|e| {
            format!(
                "failed to initialize nomic-embed-text-v1.5: {e}. \
                 ensure ONNX runtime is available and model files can be downloaded"
            )
        })
    });

    match result {
        Ok(model) => model
            .lock()
            .map_err(|e| EmbeddingError::ModelInit(format!("lock poisoned: {e}"))),
        Err(err) => Err(EmbeddingError::ModelInit(err.clone())),
    }
}

/// Local ONNX embedding provider, lazily loading its model on first use.
pub struct FastEmbedProvider {
    dimensions: usize,
}

impl FastEmbedProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Force the model to load now instead of on first `embed` call.
    pub fn warm_up(&self) -> Result<(), EmbeddingError> {
        get_model().map(|_| ())
    }

    pub fn is_ready(&self) -> bool {
        match get_model() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("embedding model not ready: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("text cannot be empty".into()));
        }
        let dims = self.dimensions;
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            let mut model = get_model()?;
            let text = if text.len() > MAX_TEXT_LENGTH {
                &text[..MAX_TEXT_LENGTH]
            } else {
                text.as_str()
            };
            let embeddings = model
                .embed(vec![text], None)
                .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;
            let raw = embeddings
                .into_iter()
                .next()
                .ok_or_else(|| EmbeddingError::EmbeddingFailed("no embedding generated".into()))?;
            Ok(Embedding::new(matryoshka_truncate(raw, dims)))
        })
        .await
        .map_err(|e| EmbeddingError::EmbeddingFailed(format!("embedding task panicked: {e}")))?
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let dims = self.dimensions;
        let owned: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
        tokio::task::spawn_blocking(move || {
            let mut model = get_model()?;
            let mut out = Vec::with_capacity(owned.len());
            for chunk in owned.chunks(BATCH_SIZE) {
                let truncated: Vec<&str> = chunk
                    .iter()
                    .map(|t| if t.len() > MAX_TEXT_LENGTH { &t[..MAX_TEXT_LENGTH] } else { t.as_str() })
                    .collect();
                let embeddings = model
                    .embed(truncated, None)
                    .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;
                for e in embeddings {
                    out.push(Embedding::new(matryoshka_truncate(e, dims)));
                }
            }
            Ok(out)
        })
        .await
        .map_err(|e| EmbeddingError::EmbeddingFailed(format!("embedding task panicked: {e}")))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "nomic-ai/nomic-embed-text-v1.5"
    }
}
