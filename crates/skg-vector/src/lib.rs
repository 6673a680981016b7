//! SKG Vector - Semantic similarity over extracted knowledge
//!
//! Embedding clients, a process-lifetime embedding cache and the
//! cosine-similarity index used for semantic search and domain linking.

pub mod cache;
pub mod embedding;
pub mod index;

pub use cache::{CacheStats, CacheStatsReport, CachedEmbedding, EmbeddingCache};
#[cfg(feature = "local")]
pub use embedding::LocalEmbedding;
pub use embedding::{create_embedding_client, EmbeddingClient, OllamaEmbedding, MINILM_DIMENSION};
pub use index::{candidates, cosine_similarity, Match, QueryMode, SemanticIndex, SimilarPair};
