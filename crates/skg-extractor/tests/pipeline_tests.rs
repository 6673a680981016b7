//! Pipeline Integration Tests
//!
//! Uses an in-memory annotator with hand-written parses so no parse
//! service is needed.
//!
//! Author: hephaex@gmail.com

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use skg_core::{Result, SkgError, Triple, TripleStore};
use skg_extractor::{
    AnnotatedSentence, AnnotatedToken, DependencyAnnotator, EntitySpan, ExtractionPipeline,
};

/// Annotator backed by a fixed table of parses
struct MockAnnotator {
    parses: HashMap<String, AnnotatedSentence>,
}

#[async_trait]
impl DependencyAnnotator for MockAnnotator {
    async fn annotate(&self, text: &str) -> Result<AnnotatedSentence> {
        self.parses
            .get(text)
            .cloned()
            .ok_or_else(|| SkgError::Annotation(format!("no parse for '{text}'")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Build a parse from (text, pos, dep, head) rows and entity (text, label) pairs
fn parse(rows: &[(&str, &str, &str, usize)], ents: &[(&str, &str)]) -> AnnotatedSentence {
    let text = rows.iter().map(|r| r.0).collect::<Vec<_>>().join(" ");
    let tokens = rows
        .iter()
        .enumerate()
        .map(|(i, (t, pos, dep, head))| AnnotatedToken {
            index: i,
            text: t.to_string(),
            pos: pos.to_string(),
            tag: String::new(),
            dep: dep.to_string(),
            head: *head,
        })
        .collect();
    let ents = ents
        .iter()
        .map(|(t, label)| {
            let start = text.find(t).unwrap_or(0);
            EntitySpan {
                text: t.to_string(),
                label: label.to_string(),
                start,
                end: start + t.len(),
            }
        })
        .collect();
    AnnotatedSentence { text, tokens, ents }
}

fn annotator() -> Arc<MockAnnotator> {
    let mut parses = HashMap::new();
    parses.insert(
        "The cat chased the mouse".to_string(),
        parse(
            &[
                ("The", "DET", "det", 1),
                ("cat", "NOUN", "nsubj", 2),
                ("chased", "VERB", "ROOT", 2),
                ("the", "DET", "det", 4),
                ("mouse", "NOUN", "dobj", 2),
            ],
            &[],
        ),
    );
    parses.insert(
        "Einstein developed relativity".to_string(),
        parse(
            &[
                ("Einstein", "PROPN", "nsubj", 1),
                ("developed", "VERB", "ROOT", 1),
                ("relativity", "NOUN", "dobj", 1),
            ],
            &[("Einstein", "PERSON")],
        ),
    );
    parses.insert(
        "Dogs bark".to_string(),
        parse(&[("Dogs", "NOUN", "nsubj", 1), ("bark", "VERB", "ROOT", 1)], &[]),
    );
    parses.insert(
        "The Louvre houses the Mona_Lisa".to_string(),
        parse(
            &[
                ("The", "DET", "det", 1),
                ("Louvre", "PROPN", "nsubj", 2),
                ("houses", "VERB", "ROOT", 2),
                ("the", "DET", "det", 4),
                ("Mona_Lisa", "PROPN", "dobj", 2),
            ],
            &[("Louvre", "ORG"), ("Mona_Lisa", "WORK_OF_ART")],
        ),
    );
    parses.insert(
        "Who developed relativity".to_string(),
        parse(
            &[
                ("Who", "PRON", "nsubj", 1),
                ("developed", "VERB", "ROOT", 1),
                ("relativity", "NOUN", "dobj", 1),
            ],
            &[],
        ),
    );
    parses.insert(
        "What did the cat do".to_string(),
        parse(
            &[
                ("What", "PRON", "dobj", 4),
                ("did", "AUX", "aux", 4),
                ("the", "DET", "det", 3),
                ("cat", "NOUN", "nsubj", 4),
                ("do", "VERB", "ROOT", 4),
            ],
            &[],
        ),
    );
    Arc::new(MockAnnotator { parses })
}

#[tokio::test]
async fn test_run_collects_triples_in_order() {
    let pipeline = ExtractionPipeline::new(annotator());
    let sentences = vec![
        "The cat chased the mouse",
        "Dogs bark",
        "Einstein developed relativity",
        "The cat chased the mouse",
    ];

    let report = pipeline.run(sentences.as_slice()).await.unwrap();

    assert_eq!(report.sentences_processed, 4);
    assert_eq!(report.sentences_without_triples, 1);
    assert_eq!(
        report.store.as_slice(),
        &[
            Triple::new("cat", "chased", "mouse"),
            Triple::new("Einstein", "developed", "relativity"),
            Triple::new("cat", "chased", "mouse"),
        ]
    );
    assert_eq!(report.entities.len(), 1);
    assert_eq!(report.entities[0].entity_type, "PERSON");
}

#[tokio::test]
async fn test_run_empty_input() {
    let pipeline = ExtractionPipeline::new(annotator());
    let report = pipeline.run::<String>(&[]).await.unwrap();
    assert!(report.store.is_empty());
    assert_eq!(report.sentences_processed, 0);
}

#[tokio::test]
async fn test_annotation_failure_aborts() {
    let pipeline = ExtractionPipeline::new(annotator());
    let err = pipeline
        .run(&["The cat chased the mouse", "unparseable"])
        .await
        .unwrap_err();
    assert!(matches!(err, SkgError::Annotation(_)));
}

#[tokio::test]
async fn test_normalization() {
    let pipeline = ExtractionPipeline::new(annotator()).with_normalization(true);
    let report = pipeline
        .run(&["The Louvre houses the Mona_Lisa", "Einstein developed relativity"])
        .await
        .unwrap();

    assert_eq!(
        report.store.as_slice(),
        &[
            Triple::new("louvre", "houses", "mona_lisa"),
            Triple::new("einstein", "developed", "relativity"),
        ]
    );
}

#[tokio::test]
async fn test_answer_question() {
    let pipeline = ExtractionPipeline::new(annotator());
    let report = pipeline
        .run(&[
            "The cat chased the mouse",
            "Einstein developed relativity",
            "The cat chased the mouse",
        ])
        .await
        .unwrap();

    // "relativity" is a NOUN token of the question
    let answers = pipeline
        .answer_question("Who developed relativity", &report.store)
        .await
        .unwrap();
    assert_eq!(answers, vec![Triple::new("Einstein", "developed", "relativity")]);

    // Duplicate triples are reported once
    let answers = pipeline
        .answer_question("What did the cat do", &report.store)
        .await
        .unwrap();
    assert_eq!(answers, vec![Triple::new("cat", "chased", "mouse")]);
}

#[tokio::test]
async fn test_answer_question_without_terms() {
    let pipeline = ExtractionPipeline::new(annotator());
    let store: TripleStore = vec![Triple::new("cat", "chased", "mouse")].into_iter().collect();
    let answers = pipeline.answer_question("Dogs bark", &store).await.unwrap();
    // "Dogs" is a noun but matches nothing
    assert!(answers.is_empty());
}

#[tokio::test]
async fn test_exported_file_round_trip() {
    let pipeline = ExtractionPipeline::new(annotator());
    let report = pipeline
        .run(&["The cat chased the mouse", "Einstein developed relativity"])
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("triples_output.csv");
    report.store.write_csv(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text,
        "Entity1,Relation,Entity2\ncat,chased,mouse\nEinstein,developed,relativity\n"
    );
    assert_eq!(TripleStore::read_csv(&path).unwrap(), report.store);
}
