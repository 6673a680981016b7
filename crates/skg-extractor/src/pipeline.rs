//! Extraction pipeline
//!
//! One sequential pass over all sentences: annotate, list entities, extract
//! triples, append to the store. Sentences are awaited one at a time in
//! input order.

use std::sync::Arc;

use skg_core::{Result, Triple, TripleStore};
use tracing::{debug, info};

use crate::annotation::DependencyAnnotator;
use crate::ner::{extract_entities, question_terms};
use crate::query::QueryMatcher;
use crate::relation::DependencyRe;
use crate::{ExtractedEntity, RelationExtractor};

/// Outcome of one extraction pass
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Triples in sentence order
    pub store: TripleStore,
    /// Entity spans found across all sentences
    pub entities: Vec<ExtractedEntity>,
    /// Number of sentences annotated
    pub sentences_processed: usize,
    /// Sentences that yielded no triple
    pub sentences_without_triples: usize,
}

/// Sentence-to-triple pipeline
pub struct ExtractionPipeline {
    annotator: Arc<dyn DependencyAnnotator>,
    extractor: DependencyRe,
    normalize_entities: bool,
}

impl ExtractionPipeline {
    /// Create a pipeline around a loaded annotator
    pub fn new(annotator: Arc<dyn DependencyAnnotator>) -> Self {
        Self {
            annotator,
            extractor: DependencyRe::new(),
            normalize_entities: false,
        }
    }

    /// Lowercase entities and strip a leading "the " after extraction
    pub fn with_normalization(mut self, enabled: bool) -> Self {
        self.normalize_entities = enabled;
        self
    }

    /// Annotate every sentence and collect triples
    ///
    /// A sentence without a triple is skipped; a failed annotation aborts
    /// the whole run.
    pub async fn run<S: AsRef<str>>(&self, sentences: &[S]) -> Result<ExtractionReport> {
        let mut report = ExtractionReport::default();

        for sentence in sentences {
            let text = sentence.as_ref();
            let annotated = self.annotator.annotate(text).await?;
            report.sentences_processed += 1;

            report.entities.extend(extract_entities(&annotated));

            let relations = self.extractor.extract(&annotated);
            if relations.is_empty() {
                report.sentences_without_triples += 1;
                debug!(sentence = text, "no triple extracted");
                continue;
            }

            if self.normalize_entities {
                report
                    .store
                    .extend(relations.iter().map(Triple::normalized));
            } else {
                report.store.extend(relations);
            }
        }

        info!(
            annotator = self.annotator.name(),
            sentences = report.sentences_processed,
            misses = report.sentences_without_triples,
            triples = report.store.len(),
            entities = report.entities.len(),
            "extraction finished"
        );
        Ok(report)
    }

    /// Answer a question with the substring heuristic
    pub async fn answer_question(&self, question: &str, store: &TripleStore) -> Result<Vec<Triple>> {
        let annotated = self.annotator.annotate(question).await?;
        let mut terms = question_terms(&annotated);
        if self.normalize_entities {
            // Stored entities are normalized; match against the same form
            terms = terms.iter().map(|t| skg_core::normalize_entity(t)).collect();
        }
        debug!(?terms, "question terms");
        Ok(QueryMatcher::new(terms).answer(store))
    }
}
