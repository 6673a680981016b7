//! Embedding cache
//!
//! Vectors are memoized per exact text for the lifetime of the process, so
//! repeated searches over the same candidates embed them only once.
//!
//! Uses the moka crate for thread-safe, async-compatible caching.
//!
//! Author: hephaex@gmail.com

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use skg_core::{Result, SkgError};
use tracing::debug;

use crate::embedding::EmbeddingClient;

// ============================================================================
// Embedding Cache
// ============================================================================

/// Cache for sentence embeddings keyed by exact text
#[derive(Clone)]
pub struct EmbeddingCache {
    cache: Cache<String, Vec<f32>>,
    stats: Arc<CacheStats>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` vectors
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).build(),
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// Get an embedding from cache
    pub async fn get(&self, text: &str) -> Option<Vec<f32>> {
        let result = self.cache.get(text).await;

        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }

        result
    }

    /// Store an embedding in cache
    pub async fn put(&self, text: &str, embedding: Vec<f32>) {
        self.cache.insert(text.to_string(), embedding).await;
        self.stats.record_write();
    }

    pub fn contains(&self, text: &str) -> bool {
        self.cache.contains_key(text)
    }

    /// Get cache statistics
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Get current cache size
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Counters plus the current size
    pub async fn report(&self) -> CacheStatsReport {
        // entry_count lags until pending inserts are applied
        self.cache.run_pending_tasks().await;
        CacheStatsReport {
            hits: self.stats.hits(),
            misses: self.stats.misses(),
            writes: self.stats.writes(),
            hit_rate: self.stats.hit_rate(),
            entries: self.entry_count(),
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

// ============================================================================
// Cached Client
// ============================================================================

/// Embedding client wrapper that consults the cache first
pub struct CachedEmbedding<C> {
    inner: C,
    cache: EmbeddingCache,
}

impl<C: EmbeddingClient> CachedEmbedding<C> {
    pub fn new(inner: C, cache: EmbeddingCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: EmbeddingClient> EmbeddingClient for CachedEmbedding<C> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self.cache.get(text).await {
            return Ok(vector);
        }
        let vector = self.inner.embed(text).await?;
        self.cache.put(text, vector.clone()).await;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<String> = Vec::new();
        for text in texts {
            let cached = self.cache.get(text).await;
            if cached.is_none() && !missing.contains(text) {
                missing.push(text.clone());
            }
            vectors.push(cached);
        }

        let mut computed: HashMap<String, Vec<f32>> = HashMap::new();
        if !missing.is_empty() {
            debug!(
                requested = texts.len(),
                missing = missing.len(),
                "embedding cache misses"
            );
            let fresh = self.inner.embed_batch(&missing).await?;
            if fresh.len() != missing.len() {
                return Err(SkgError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    missing.len(),
                    fresh.len()
                )));
            }
            for (text, vector) in missing.into_iter().zip(fresh) {
                self.cache.put(&text, vector.clone()).await;
                computed.insert(text, vector);
            }
        }

        texts
            .iter()
            .zip(vectors)
            .map(|(text, cached)| {
                cached
                    .or_else(|| computed.get(text).cloned())
                    .ok_or_else(|| SkgError::Embedding(format!("No embedding for '{text}'")))
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

// ============================================================================
// Cache Statistics
// ============================================================================

/// Statistics for cache performance monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Calculate hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatsReport {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub hit_rate: f64,
    pub entries: u64,
}

impl std::fmt::Display for CacheStatsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} hits, {} misses ({:.0}% hit rate), {} vectors cached",
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.entries
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Embeds a text as [len, 1.0] and counts texts sent to it
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    fn cached() -> CachedEmbedding<CountingEmbedder> {
        CachedEmbedding::new(
            CountingEmbedder {
                calls: AtomicUsize::new(0),
            },
            EmbeddingCache::new(100),
        )
    }

    #[tokio::test]
    async fn test_embedding_cache_basic() {
        let cache = EmbeddingCache::new(10);

        let text = "Hello, world!";
        let embedding = vec![0.1, 0.2, 0.3, 0.4];

        // Initially not in cache
        assert!(cache.get(text).await.is_none());
        assert_eq!(cache.stats().hits(), 0);
        assert_eq!(cache.stats().misses(), 1);

        // Put and retrieve
        cache.put(text, embedding.clone()).await;
        let retrieved = cache.get(text).await;
        assert_eq!(retrieved, Some(embedding));
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().writes(), 1);
        assert!(cache.contains(text));
    }

    #[tokio::test]
    async fn test_cache_report() {
        let cache = EmbeddingCache::default();

        cache.put("text1", vec![1.0]).await;
        cache.put("text2", vec![2.0]).await;
        assert!(cache.get("text1").await.is_some());
        assert!(cache.get("text3").await.is_none());

        let report = cache.report().await;
        assert_eq!(report.hits, 1);
        assert_eq!(report.misses, 1);
        assert_eq!(report.writes, 2);
        assert_eq!(report.entries, 2);
        assert_eq!(
            report.to_string(),
            "1 hits, 1 misses (50% hit rate), 2 vectors cached"
        );
    }

    #[test]
    fn test_cached_embed_calls_inner_once() {
        tokio_test::block_on(async {
            let client = cached();
            let first = client.embed("cat").await.unwrap();
            let second = client.embed("cat").await.unwrap();
            assert_eq!(first, second);
            assert_eq!(client.inner().calls.load(Ordering::SeqCst), 1);
            assert!((client.cache().stats().hit_rate() - 0.5).abs() < 1e-9);
        });
    }

    #[test]
    fn test_cached_batch_only_embeds_misses() {
        tokio_test::block_on(async {
            let client = cached();
            client.embed("mouse").await.unwrap();

            let texts = vec![
                "cat".to_string(),
                "mouse".to_string(),
                "cat".to_string(),
            ];
            let vectors = client.embed_batch(&texts).await.unwrap();

            assert_eq!(vectors, vec![vec![3.0, 1.0], vec![5.0, 1.0], vec![3.0, 1.0]]);
            // "mouse" once up front, then "cat" once for the batch
            assert_eq!(client.inner().calls.load(Ordering::SeqCst), 2);
            assert_eq!(client.model_name(), "counting");
        });
    }
}
