//! Process-wide model registry
//!
//! The annotator and embedder are built once per process and handed to the
//! commands by reference.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use skg_core::{AppConfig, Result};
use skg_extractor::{DependencyAnnotator, SpacyHttpAnnotator};
use skg_vector::{create_embedding_client, CachedEmbedding, EmbeddingCache, EmbeddingClient};
use tracing::info;

static MODELS: OnceCell<Models> = OnceCell::new();

/// Embedder used by every command: the configured client behind a cache
pub type SharedEmbedder = CachedEmbedding<Arc<dyn EmbeddingClient>>;

pub struct Models {
    annotator: Arc<dyn DependencyAnnotator>,
    embedder: SharedEmbedder,
}

impl Models {
    pub fn new(
        annotator: Arc<dyn DependencyAnnotator>,
        embedder: Arc<dyn EmbeddingClient>,
        cache_capacity: u64,
    ) -> Self {
        Self {
            annotator,
            embedder: CachedEmbedding::new(embedder, EmbeddingCache::new(cache_capacity)),
        }
    }

    /// Build the configured annotator and embedder
    pub fn load(config: &AppConfig) -> Result<Self> {
        let annotator = Arc::new(SpacyHttpAnnotator::from_config(&config.annotator)?);
        let embedder = create_embedding_client(&config.embedding)?;
        info!(
            annotator = annotator.name(),
            annotator_model = %config.annotator.model,
            embedder = embedder.model_name(),
            "models ready"
        );
        Ok(Self::new(
            annotator,
            embedder,
            config.embedding.cache_capacity,
        ))
    }

    /// Models for this process, built on first use
    pub fn global(config: &AppConfig) -> Result<&'static Models> {
        MODELS.get_or_try_init(|| Self::load(config))
    }

    pub fn annotator(&self) -> Arc<dyn DependencyAnnotator> {
        Arc::clone(&self.annotator)
    }

    pub fn embedder(&self) -> &SharedEmbedder {
        &self.embedder
    }
}
