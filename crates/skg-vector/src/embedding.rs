//! Embedding clients for generating sentence vectors
//!
//! all-MiniLM-L6-v2 is available either through an Ollama server (model
//! `all-minilm`) or in-process on CPU with the `local` feature.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use skg_core::{EmbeddingConfig, EmbeddingProvider, Result, SkgError};

/// Output dimension of all-MiniLM-L6-v2
pub const MINILM_DIMENSION: usize = 384;

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;

    /// Name of the underlying model
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: EmbeddingClient + ?Sized> EmbeddingClient for Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, model)
    }

    fn with_client(client: Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "all-minilm" | "all-minilm:l6-v2" => MINILM_DIMENSION,
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            _ => MINILM_DIMENSION,
        };

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SkgError::Embedding(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(
            client,
            config.ollama_url.clone(),
            config.model.clone(),
        ))
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| SkgError::Embedding(format!("Ollama embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SkgError::Embedding(format!(
                "Ollama embedding error: {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            SkgError::Embedding(format!("Failed to parse embedding response: {e}"))
        })?;

        Ok(result.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama doesn't have native batch embedding, so we process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Local Embedding (fastembed)
// ============================================================================

#[cfg(feature = "local")]
pub use local::LocalEmbedding;

#[cfg(feature = "local")]
mod local {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use skg_core::{Result, SkgError};
    use tracing::info;

    use super::{EmbeddingClient, MINILM_DIMENSION};

    /// all-MiniLM-L6-v2 run in-process on the CPU execution provider
    pub struct LocalEmbedding {
        model: Arc<Mutex<TextEmbedding>>,
    }

    /// Model options pinned to the CPU
    ///
    /// No accelerator is registered, so ONNX Runtime runs every node on its
    /// CPU execution provider.
    fn cpu_options() -> InitOptions {
        InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_execution_providers(Vec::new())
    }

    impl LocalEmbedding {
        /// Load the model, downloading weights on first use
        pub fn new() -> Result<Self> {
            let model = TextEmbedding::try_new(cpu_options())
                .map_err(|e| SkgError::Embedding(format!("Failed to load local model: {e}")))?;
            info!("loaded local all-MiniLM-L6-v2");
            Ok(Self {
                model: Arc::new(Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl EmbeddingClient for LocalEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.embed_batch(&[text.to_string()])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| SkgError::Embedding("No embedding returned".to_string()))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let model = Arc::clone(&self.model);
            let documents = texts.to_vec();
            tokio::task::spawn_blocking(move || {
                let mut model = model
                    .lock()
                    .map_err(|_| SkgError::Embedding("Local model lock poisoned".to_string()))?;
                model
                    .embed(documents, None)
                    .map_err(|e| SkgError::Embedding(format!("Local embedding failed: {e}")))
            })
            .await
            .map_err(|e| SkgError::Embedding(format!("Embedding task failed: {e}")))?
        }

        fn dimension(&self) -> usize {
            MINILM_DIMENSION
        }

        fn model_name(&self) -> &str {
            "all-MiniLM-L6-v2"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_no_accelerator_registered() {
            let options = cpu_options();
            assert!(options.execution_providers.is_empty());
            assert_eq!(options.model_name, EmbeddingModel::AllMiniLML6V2);
        }
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>> {
    match config.provider {
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbedding::from_config(config)?)),
        #[cfg(feature = "local")]
        EmbeddingProvider::Local => Ok(Arc::new(LocalEmbedding::new()?)),
        #[cfg(not(feature = "local"))]
        EmbeddingProvider::Local => Err(SkgError::Embedding(
            "Local embeddings require building with the `local` feature".to_string(),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================
