//! Relation Extraction (RE) module
//!
//! Extracts subject-verb-object triples from a dependency-annotated
//! sentence with a fixed set of label rules.

use skg_core::Triple;

use crate::annotation::AnnotatedSentence;
use crate::RelationExtractor;

// ============================================================================
// Dependency Labels
// ============================================================================

/// Dependency label of a clause root
pub const ROOT_LABEL: &str = "ROOT";

/// Part of speech a root must carry
pub const ROOT_POS: &str = "VERB";

/// Labels accepted for the subject (left of the root)
pub const SUBJECT_LABELS: &[&str] = &["nsubj", "nsubjpass"];

/// Labels accepted for the object (right of the root)
pub const OBJECT_LABELS: &[&str] = &["dobj", "attr", "dative", "oprd"];

// ============================================================================
// Dependency-pattern RE
// ============================================================================

/// Rule-based relation extractor over dependency parses
///
/// For every token labelled `ROOT` whose part of speech is `VERB`, the first
/// left dependent with a subject label and the first right dependent with
/// an object label form a triple with the root's surface text as predicate.
/// Roots missing either side produce nothing. Coordinated or multi-clause
/// sentences are not decomposed.
#[derive(Debug, Clone)]
pub struct DependencyRe {
    subject_labels: Vec<String>,
    object_labels: Vec<String>,
}

impl DependencyRe {
    /// Create an extractor with the standard label sets
    pub fn new() -> Self {
        Self {
            subject_labels: SUBJECT_LABELS.iter().map(|s| s.to_string()).collect(),
            object_labels: OBJECT_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Labels accepted on the subject side
    pub fn subject_labels(&self) -> &[String] {
        &self.subject_labels
    }

    /// Labels accepted on the object side
    pub fn object_labels(&self) -> &[String] {
        &self.object_labels
    }

    fn is_subject(&self, dep: &str) -> bool {
        self.subject_labels.iter().any(|l| l == dep)
    }

    fn is_object(&self, dep: &str) -> bool {
        self.object_labels.iter().any(|l| l == dep)
    }

    /// Extract every triple of one sentence
    pub fn extract_relations(&self, sentence: &AnnotatedSentence) -> Vec<Triple> {
        let mut relations = Vec::new();

        for token in &sentence.tokens {
            if token.dep != ROOT_LABEL || token.pos != ROOT_POS {
                continue;
            }

            let subject = sentence
                .lefts(token.index)
                .find(|w| self.is_subject(&w.dep));
            let object = sentence
                .rights(token.index)
                .find(|w| self.is_object(&w.dep));

            if let (Some(subject), Some(object)) = (subject, object) {
                relations.push(Triple::new(
                    subject.text.clone(),
                    token.text.clone(),
                    object.text.clone(),
                ));
            }
        }

        relations
    }
}

impl Default for DependencyRe {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationExtractor for DependencyRe {
    fn extract(&self, sentence: &AnnotatedSentence) -> Vec<Triple> {
        self.extract_relations(sentence)
    }
}

// ============================================================================
// Tests
// ============================================================================
