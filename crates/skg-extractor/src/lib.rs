//! SKG Extractor - Knowledge extraction pipeline
//!
//! Turns dependency-annotated sentences into subject-verb-object triples
//! and answers questions against the extracted triples.

use skg_core::Triple;

pub mod annotation;
pub mod ner;
pub mod pipeline;
pub mod query;
pub mod relation;

pub use annotation::{AnnotatedSentence, AnnotatedToken, DependencyAnnotator, EntitySpan, SpacyHttpAnnotator};
pub use pipeline::{ExtractionPipeline, ExtractionReport};
pub use query::QueryMatcher;
pub use relation::DependencyRe;

/// Extracted entity from text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntity {
    pub text: String,
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
}

/// Trait for entity extractors
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, sentence: &AnnotatedSentence) -> Vec<ExtractedEntity>;
}

/// Trait for relation extractors
pub trait RelationExtractor: Send + Sync {
    fn extract(&self, sentence: &AnnotatedSentence) -> Vec<Triple>;
}
