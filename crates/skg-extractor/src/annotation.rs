//! Dependency annotation
//!
//! The dependency parser is an external collaborator. This module holds the
//! per-sentence annotation model, the `DependencyAnnotator` trait and an
//! HTTP client for services that return spaCy's `Doc.to_json()` format.
//!
//! Author: hephaex@gmail.com

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use skg_core::{AnnotatorConfig, Result, SkgError};
use tracing::debug;

// ============================================================================
// Annotation Model
// ============================================================================

/// One token of an annotated sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedToken {
    /// Position in the sentence
    pub index: usize,
    /// Surface text
    pub text: String,
    /// Coarse part-of-speech tag (`VERB`, `NOUN`, `PROPN`, ...)
    pub pos: String,
    /// Fine-grained tag
    pub tag: String,
    /// Dependency label (`ROOT`, `nsubj`, `dobj`, ...)
    pub dep: String,
    /// Index of the syntactic head; a root points at itself
    pub head: usize,
}

/// A named-entity span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub text: String,
    pub label: String,
    /// Character offsets into the sentence
    pub start: usize,
    pub end: usize,
}

/// Annotator output for one sentence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedSentence {
    pub text: String,
    pub tokens: Vec<AnnotatedToken>,
    pub ents: Vec<EntitySpan>,
}

impl AnnotatedSentence {
    /// Syntactic children of token `index`, in sentence order
    pub fn children(&self, index: usize) -> impl Iterator<Item = &AnnotatedToken> {
        self.tokens
            .iter()
            .filter(move |t| t.head == index && t.index != index)
    }

    /// Children that precede token `index`
    pub fn lefts(&self, index: usize) -> impl Iterator<Item = &AnnotatedToken> {
        self.children(index).filter(move |t| t.index < index)
    }

    /// Children that follow token `index`
    pub fn rights(&self, index: usize) -> impl Iterator<Item = &AnnotatedToken> {
        self.children(index).filter(move |t| t.index > index)
    }

    /// Build from a spaCy `Doc.to_json()` document
    pub fn from_spacy(doc: SpacyDoc) -> Result<Self> {
        // spaCy offsets count characters, not bytes
        let boundaries: Vec<usize> = doc
            .text
            .char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(doc.text.len()))
            .collect();
        let char_len = boundaries.len() - 1;
        let slice = |start: usize, end: usize| -> Result<String> {
            match (boundaries.get(start), boundaries.get(end)) {
                (Some(&s), Some(&e)) if s <= e => Ok(doc.text[s..e].to_string()),
                _ => Err(SkgError::Annotation(format!(
                    "span {start}..{end} outside text of {char_len} characters"
                ))),
            }
        };

        let mut tokens = Vec::with_capacity(doc.tokens.len());
        for (position, tok) in doc.tokens.iter().enumerate() {
            if tok.id != position {
                return Err(SkgError::Annotation(format!(
                    "token ids out of order: expected {position}, got {}",
                    tok.id
                )));
            }
            if tok.head >= doc.tokens.len() {
                return Err(SkgError::Annotation(format!(
                    "token {} has head {} beyond sentence end",
                    tok.id, tok.head
                )));
            }
            tokens.push(AnnotatedToken {
                index: tok.id,
                text: slice(tok.start, tok.end)?,
                pos: tok.pos.clone(),
                tag: tok.tag.clone(),
                dep: tok.dep.clone(),
                head: tok.head,
            });
        }

        let ents = doc
            .ents
            .iter()
            .map(|e| {
                Ok(EntitySpan {
                    text: slice(e.start, e.end)?,
                    label: e.label.clone(),
                    start: e.start,
                    end: e.end,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            text: doc.text,
            tokens,
            ents,
        })
    }
}

// ============================================================================
// spaCy JSON format
// ============================================================================

/// Document as produced by spaCy's `Doc.to_json()`
///
/// Offsets are character offsets into `text`; unknown fields (lemma,
/// morph, sents) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SpacyDoc {
    pub text: String,
    #[serde(default)]
    pub ents: Vec<SpacyEnt>,
    #[serde(default)]
    pub tokens: Vec<SpacyToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpacyEnt {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpacyToken {
    pub id: usize,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub dep: String,
    pub head: usize,
}

// ============================================================================
// Annotator Trait
// ============================================================================

/// Trait for dependency annotators
#[async_trait]
pub trait DependencyAnnotator: Send + Sync {
    /// Parse one sentence
    async fn annotate(&self, text: &str) -> Result<AnnotatedSentence>;

    /// Get annotator name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// HTTP Annotator
// ============================================================================

/// Client for a spaCy-compatible parse service
pub struct SpacyHttpAnnotator {
    client: Client,
    url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ParseRequest<'a> {
    text: &'a str,
    model: &'a str,
}

impl SpacyHttpAnnotator {
    /// Create a new annotator client
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            model: model.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &AnnotatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SkgError::Annotation(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl DependencyAnnotator for SpacyHttpAnnotator {
    async fn annotate(&self, text: &str) -> Result<AnnotatedSentence> {
        let request = ParseRequest {
            text,
            model: &self.model,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SkgError::Annotation(format!("Parse request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SkgError::Annotation(format!(
                "Parse service error: {error_text}"
            )));
        }

        let doc: SpacyDoc = response
            .json()
            .await
            .map_err(|e| SkgError::Annotation(format!("Failed to parse annotation: {e}")))?;

        debug!(tokens = doc.tokens.len(), ents = doc.ents.len(), "annotated sentence");
        AnnotatedSentence::from_spacy(doc)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
