//! Heuristic query answering
//!
//! Not question answering: a question is reduced to terms (entities and
//! noun-like tokens) and every stored triple whose subject or object
//! contains one of them, ignoring case, is returned. Results keep store
//! order; a triple whose "subject predicate object" sentence was already
//! returned is skipped.

use std::collections::HashSet;

use skg_core::{Triple, TripleStore};
use tracing::debug;

/// Case-insensitive substring matcher over stored triples
#[derive(Debug, Clone, Default)]
pub struct QueryMatcher {
    terms: Vec<String>,
}

impl QueryMatcher {
    /// Build a matcher from question terms
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Lowercased terms
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Whether a single triple matches any term
    pub fn matches(&self, triple: &Triple) -> bool {
        let subject = triple.subject.to_lowercase();
        let object = triple.object.to_lowercase();
        self.terms
            .iter()
            .any(|term| subject.contains(term.as_str()) || object.contains(term.as_str()))
    }

    /// Matching triples in insertion order, exact duplicates suppressed
    ///
    /// Duplicates are judged on the displayed sentence, so two different
    /// triples that read the same, such as ("red fox", "jumps", "fence") and
    /// ("red", "fox jumps", "fence"), yield only the first.
    pub fn answer(&self, store: &TripleStore) -> Vec<Triple> {
        if self.terms.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let answers: Vec<Triple> = store
            .iter()
            .filter(|t| self.matches(t))
            .filter(|t| seen.insert(t.sentence()))
            .cloned()
            .collect();

        debug!(terms = ?self.terms, answers = answers.len(), "matched question terms");
        answers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TripleStore {
        vec![
            Triple::new("Paris", "is", "capital of France"),
            Triple::new("Einstein", "developed", "relativity"),
            Triple::new("Paris", "is", "capital of France"),
            Triple::new("Berlin", "borders", "france"),
            Triple::new("Da Vinci", "painted", "Mona Lisa"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_case_insensitive_subject_or_object() {
        let matcher = QueryMatcher::new(["France"]);
        let answers = matcher.answer(&store());
        assert_eq!(
            answers,
            vec![
                Triple::new("Paris", "is", "capital of France"),
                Triple::new("Berlin", "borders", "france"),
            ]
        );
    }

    #[test]
    fn test_predicate_is_not_searched() {
        let matcher = QueryMatcher::new(["painted"]);
        assert!(matcher.answer(&store()).is_empty());
    }

    #[test]
    fn test_substring_match() {
        let matcher = QueryMatcher::new(["vinci", "relat"]);
        let answers = matcher.answer(&store());
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].subject, "Einstein");
        assert_eq!(answers[1].subject, "Da Vinci");
    }

    #[test]
    fn test_duplicates_judged_on_sentence() {
        let store: TripleStore = vec![
            Triple::new("red fox", "jumps", "fence"),
            Triple::new("red", "fox jumps", "fence"),
            Triple::new("red fox", "jumps", "fence"),
        ]
        .into_iter()
        .collect();

        let answers = QueryMatcher::new(["fence"]).answer(&store);
        assert_eq!(answers, vec![Triple::new("red fox", "jumps", "fence")]);
    }

    #[test]
    fn test_no_terms_no_answers() {
        let matcher = QueryMatcher::new(Vec::<String>::new());
        assert!(matcher.answer(&store()).is_empty());
        let matcher = QueryMatcher::new([""]);
        assert!(matcher.terms().is_empty());
    }
}
