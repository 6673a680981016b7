//! Named Entity Recognition (NER) module
//!
//! Named entities come from the dependency annotator; this module turns
//! them into `ExtractedEntity` values and collects the search terms of a
//! question (entities plus noun-like tokens).

use std::collections::HashSet;

use crate::annotation::AnnotatedSentence;
use crate::{EntityExtractor, ExtractedEntity};

/// Parts of speech treated as noun-like question terms
pub const NOUN_POS: &[&str] = &["NOUN", "PROPN"];

/// Entity extractor that reads the annotator's entity spans
#[derive(Debug, Clone, Default)]
pub struct AnnotatorNer;

impl AnnotatorNer {
    pub fn new() -> Self {
        Self
    }
}

impl EntityExtractor for AnnotatorNer {
    fn extract(&self, sentence: &AnnotatedSentence) -> Vec<ExtractedEntity> {
        extract_entities(sentence)
    }
}

/// Entity spans of one sentence as (text, label) pairs
pub fn extract_entities(sentence: &AnnotatedSentence) -> Vec<ExtractedEntity> {
    sentence
        .ents
        .iter()
        .map(|e| ExtractedEntity {
            text: e.text.clone(),
            entity_type: e.label.clone(),
            start: e.start,
            end: e.end,
        })
        .collect()
}

/// Search terms of a question: entity texts, then NOUN/PROPN token texts
///
/// Repeated terms are dropped; order of first appearance is kept.
pub fn question_terms(question: &AnnotatedSentence) -> Vec<String> {
    let mut seen = HashSet::new();
    question
        .ents
        .iter()
        .map(|e| e.text.as_str())
        .chain(
            question
                .tokens
                .iter()
                .filter(|t| NOUN_POS.contains(&t.pos.as_str()))
                .map(|t| t.text.as_str()),
        )
        .filter(|term| !term.trim().is_empty())
        .filter(|term| seen.insert(*term))
        .map(str::to_string)
        .collect()
}
