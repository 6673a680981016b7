//! Semantic index
//!
//! Embeds a fixed list of candidate strings (entity nodes or synthesized
//! triple sentences) once, then answers nearest-neighbour queries and
//! all-pairs linking by cosine similarity.

use serde::Serialize;
use skg_core::{LinkTarget, Result, SkgError, TripleStore};
use tracing::{debug, info};

use crate::embedding::EmbeddingClient;

/// Cosine similarity in [-1, 1]; zero vectors score 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Candidate strings for a link target, in store order
pub fn candidates(store: &TripleStore, target: LinkTarget) -> Vec<String> {
    match target {
        LinkTarget::Entities => store.entities(),
        LinkTarget::Triples => store.sentences(),
    }
}

/// How query results are selected
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryMode {
    /// The `k` most similar candidates regardless of score
    TopK(usize),
    /// Every candidate scoring strictly above the threshold
    Threshold(f32),
}

impl Default for QueryMode {
    fn default() -> Self {
        Self::TopK(5)
    }
}

/// One query hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub text: String,
    /// Position in the candidate list
    pub index: usize,
    pub score: f32,
}

/// Two candidates judged similar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarPair {
    pub left: String,
    pub right: String,
    pub score: f32,
}

/// Embedded candidate set
#[derive(Debug, Clone)]
pub struct SemanticIndex {
    candidates: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl SemanticIndex {
    /// Embed every candidate once
    pub async fn build<C>(client: &C, candidates: Vec<String>) -> Result<Self>
    where
        C: EmbeddingClient + ?Sized,
    {
        let vectors = client.embed_batch(&candidates).await?;
        if vectors.len() != candidates.len() {
            return Err(SkgError::Embedding(format!(
                "Expected {} embeddings, got {}",
                candidates.len(),
                vectors.len()
            )));
        }

        info!(
            model = client.model_name(),
            candidates = candidates.len(),
            "built semantic index"
        );
        Ok(Self {
            candidates,
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Rank candidates against a query, most similar first
    ///
    /// An empty result means no match, not an error.
    pub async fn query<C>(&self, client: &C, query: &str, mode: QueryMode) -> Result<Vec<Match>>
    where
        C: EmbeddingClient + ?Sized,
    {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = client.embed(query).await?;
        Ok(self.rank(&query_vector, mode))
    }

    /// Rank candidates against an already embedded query
    pub fn rank(&self, query_vector: &[f32], mode: QueryMode) -> Vec<Match> {
        let mut scored: Vec<Match> = self
            .candidates
            .iter()
            .zip(&self.vectors)
            .enumerate()
            .map(|(index, (text, vector))| Match {
                text: text.clone(),
                index,
                score: cosine_similarity(query_vector, vector),
            })
            .collect();
        // Stable: equal scores keep candidate order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        let matches: Vec<Match> = match mode {
            QueryMode::TopK(k) => scored.into_iter().take(k).collect(),
            QueryMode::Threshold(t) => scored.into_iter().filter(|m| m.score > t).collect(),
        };
        debug!(?mode, matches = matches.len(), "ranked candidates");
        matches
    }

    /// All pairs `i < j` scoring strictly above `threshold`, most similar first
    pub fn link_pairs(&self, threshold: f32, limit: Option<usize>) -> Vec<SimilarPair> {
        if self.len() < 2 {
            return Vec::new();
        }

        let mut pairs = Vec::new();
        for i in 0..self.len() {
            for j in (i + 1)..self.len() {
                let score = cosine_similarity(&self.vectors[i], &self.vectors[j]);
                if score > threshold {
                    pairs.push(SimilarPair {
                        left: self.candidates[i].clone(),
                        right: self.candidates[j].clone(),
                        score,
                    });
                }
            }
        }
        pairs.sort_by(|a, b| b.score.total_cmp(&a.score));
        if let Some(limit) = limit {
            pairs.truncate(limit);
        }

        debug!(threshold, pairs = pairs.len(), "linked candidates");
        pairs
    }
}
