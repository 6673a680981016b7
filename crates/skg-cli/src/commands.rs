//! Subcommand implementations
//!
//! Every command starts from the input table: sentences are loaded,
//! annotated and turned into triples, which are exported before any
//! further analysis. Output goes to the given writer; logs go to stderr.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use skg_core::{AppConfig, CommunityAlgorithm, LinkTarget, SearchConfig, SearchMode, Triple};
use skg_extractor::{ExtractionPipeline, ExtractionReport};
use skg_graph::{AnalyticsOutcome, GraphAnalytics, KnowledgeGraph};
use skg_vector::{candidates, QueryMode, SemanticIndex};
use tracing::{info, warn};

use crate::models::Models;

const NO_MATCH: &str = "No match found.";

/// Load, annotate and extract, then export the triples
pub async fn extract_triples(
    models: &Models,
    config: &AppConfig,
    file: &Path,
) -> Result<ExtractionReport> {
    let sentences = skg_parser::load_sentences(file, &config.input.sentence_column)?;

    let pipeline = ExtractionPipeline::new(models.annotator())
        .with_normalization(config.extraction.normalize_entities);
    let report = pipeline.run(sentences.as_slice()).await?;

    report.store.write_csv(&config.input.output_path)?;
    Ok(report)
}

pub async fn extract(
    models: &Models,
    config: &AppConfig,
    file: &Path,
    out: &mut dyn Write,
) -> Result<ExtractionReport> {
    let report = extract_triples(models, config, file).await?;
    print_extraction(&report, config, out)?;
    Ok(report)
}

fn print_extraction(report: &ExtractionReport, config: &AppConfig, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "## Extracted Triples\n")?;
    if report.store.is_empty() {
        writeln!(out, "No triples extracted.")?;
    } else {
        write!(out, "{}", report.store.to_table().to_markdown())?;
    }
    writeln!(
        out,
        "\n{} triples from {} sentences ({} without a triple), {} entity mentions",
        report.store.len(),
        report.sentences_processed,
        report.sentences_without_triples,
        report.entities.len()
    )?;
    writeln!(
        out,
        "Saved triples to {}",
        config.input.output_path.display()
    )?;
    Ok(())
}

/// Result selection for a search
///
/// `top_k` is `Some(None)` for a bare `--top-k`, which takes the configured
/// k. With neither flag the configured mode applies.
pub fn query_mode(
    search: &SearchConfig,
    top_k: Option<Option<usize>>,
    threshold: Option<f32>,
) -> QueryMode {
    match (top_k, threshold) {
        (Some(k), _) => QueryMode::TopK(k.unwrap_or(search.top_k)),
        (None, Some(t)) => QueryMode::Threshold(t),
        (None, None) => match search.mode {
            SearchMode::TopK => QueryMode::TopK(search.top_k),
            SearchMode::Threshold => QueryMode::Threshold(search.threshold),
        },
    }
}

pub async fn search(
    models: &Models,
    config: &AppConfig,
    file: &Path,
    query: &str,
    mode: QueryMode,
    out: &mut dyn Write,
) -> Result<()> {
    let report = extract_triples(models, config, file).await?;
    semantic_search(models, &report, query, mode, out).await
}

async fn semantic_search(
    models: &Models,
    report: &ExtractionReport,
    query: &str,
    mode: QueryMode,
    out: &mut dyn Write,
) -> Result<()> {
    let embedder = models.embedder();
    let index = SemanticIndex::build(embedder, candidates(&report.store, LinkTarget::Entities)).await?;
    let matches = index.query(embedder, query, mode).await?;

    writeln!(out, "## Semantic Search: {query}\n")?;
    if matches.is_empty() {
        writeln!(out, "{NO_MATCH}")?;
        return Ok(());
    }
    for m in &matches {
        writeln!(out, "- {} (similarity={:.3})", m.text, m.score)?;
    }
    Ok(())
}

pub async fn ask(
    models: &Models,
    config: &AppConfig,
    file: &Path,
    question: &str,
    out: &mut dyn Write,
) -> Result<Vec<Triple>> {
    let report = extract_triples(models, config, file).await?;
    answer(models, config, &report, question, out).await
}

async fn answer(
    models: &Models,
    config: &AppConfig,
    report: &ExtractionReport,
    question: &str,
    out: &mut dyn Write,
) -> Result<Vec<Triple>> {
    let pipeline = ExtractionPipeline::new(models.annotator())
        .with_normalization(config.extraction.normalize_entities);
    let answers = pipeline.answer_question(question, &report.store).await?;

    writeln!(out, "## Answers: {question}\n")?;
    if answers.is_empty() {
        writeln!(out, "{NO_MATCH}")?;
    }
    for triple in &answers {
        writeln!(out, "- {}", triple.sentence())?;
    }
    Ok(answers)
}

/// Options for domain linking
#[derive(Debug, Clone, Copy)]
pub struct LinkOptions {
    pub target: LinkTarget,
    pub threshold: f32,
    pub limit: Option<usize>,
}

impl LinkOptions {
    /// Configured defaults; only sentence linking is capped
    pub fn from_config(config: &AppConfig) -> Self {
        let target = config.linking.target;
        Self {
            target,
            threshold: config.linking.threshold,
            limit: match target {
                LinkTarget::Triples => link_limit(config.linking.limit),
                LinkTarget::Entities => None,
            },
        }
    }

    /// Replace the cap; 0 lifts it
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = link_limit(limit);
        self
    }
}

fn link_limit(limit: usize) -> Option<usize> {
    (limit > 0).then_some(limit)
}

pub async fn link(
    models: &Models,
    config: &AppConfig,
    file: &Path,
    options: LinkOptions,
    out: &mut dyn Write,
) -> Result<()> {
    let report = extract_triples(models, config, file).await?;
    domain_links(models, &report, options, out).await
}

async fn domain_links(
    models: &Models,
    report: &ExtractionReport,
    options: LinkOptions,
    out: &mut dyn Write,
) -> Result<()> {
    let index = SemanticIndex::build(
        models.embedder(),
        candidates(&report.store, options.target),
    )
    .await?;
    let pairs = index.link_pairs(options.threshold, options.limit);

    writeln!(out, "## Cross-Domain Links (threshold={})\n", options.threshold)?;
    if pairs.is_empty() {
        writeln!(out, "{NO_MATCH}")?;
        return Ok(());
    }
    for pair in &pairs {
        writeln!(out, "- {} <-> {} ({:.3})", pair.left, pair.right, pair.score)?;
    }
    Ok(())
}

pub async fn analyze(
    models: &Models,
    config: &AppConfig,
    file: &Path,
    algorithm: CommunityAlgorithm,
    out: &mut dyn Write,
) -> Result<()> {
    let report = extract_triples(models, config, file).await?;
    graph_analytics(config, &report, algorithm, out)
}

fn graph_analytics(
    config: &AppConfig,
    report: &ExtractionReport,
    algorithm: CommunityAlgorithm,
    out: &mut dyn Write,
) -> Result<()> {
    let graph = KnowledgeGraph::from_triples(report.store.iter());
    let analytics = GraphAnalytics::new(&config.analytics).with_algorithm(algorithm);

    writeln!(out, "## Graph Analytics\n")?;
    let report = match analytics.analyze(&graph) {
        AnalyticsOutcome::EmptyGraph => {
            writeln!(out, "No nodes available for centrality or community analysis.")?;
            return Ok(());
        }
        AnalyticsOutcome::Report(report) => report,
    };

    writeln!(
        out,
        "{} nodes, {} edges\n",
        graph.node_count(),
        graph.edge_count()
    )?;
    write!(out, "{}", report.centrality_table().to_markdown())?;

    writeln!(out, "\n### Top {} Central Nodes\n", report.top_nodes.len())?;
    for node in &report.top_nodes {
        writeln!(out, "- {}: {:.3}", node.node, node.degree)?;
    }

    writeln!(
        out,
        "\n### Communities ({}): {}\n",
        report.algorithm,
        report.communities.len()
    )?;
    for line in report.community_lines() {
        writeln!(out, "- {line}")?;
    }
    if let Some(q) = report.modularity {
        writeln!(out, "\nModularity: {q:.3}")?;
    }

    for warning in &report.warnings {
        warn!("{warning}");
        writeln!(out, "\nWarning: {warning}")?;
    }
    Ok(())
}

/// Everything at once: extraction, analytics, linking and optional queries
pub async fn run_all(
    models: &Models,
    config: &AppConfig,
    file: &Path,
    query: Option<&str>,
    question: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let report = extract(models, config, file, out).await?;
    writeln!(out)?;
    graph_analytics(config, &report, config.analytics.algorithm, out)?;
    writeln!(out)?;
    domain_links(models, &report, LinkOptions::from_config(config), out).await?;

    if let Some(query) = query {
        writeln!(out)?;
        let mode = query_mode(&config.search, None, None);
        semantic_search(models, &report, query, mode, out).await?;
    }
    if let Some(question) = question {
        writeln!(out)?;
        answer(models, config, &report, question, out).await?;
    }

    let cache = models.embedder().cache().report().await;
    writeln!(out, "\nEmbedding cache: {cache}")?;
    info!(
        triples = report.store.len(),
        cache_hits = cache.hits,
        cache_misses = cache.misses,
        cache_entries = cache.entries,
        "run finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use skg_core::SkgError;
    use skg_extractor::{AnnotatedSentence, AnnotatedToken, DependencyAnnotator};
    use skg_vector::EmbeddingClient;

    struct MockAnnotator {
        parses: HashMap<String, AnnotatedSentence>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DependencyAnnotator for MockAnnotator {
        async fn annotate(&self, text: &str) -> skg_core::Result<AnnotatedSentence> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.parses
                .get(text)
                .cloned()
                .ok_or_else(|| SkgError::Annotation(format!("no parse for '{text}'")))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    /// Letter-count vectors
    struct MockEmbedder;

    #[async_trait]
    impl EmbeddingClient for MockEmbedder {
        async fn embed(&self, text: &str) -> skg_core::Result<Vec<f32>> {
            let mut v = vec![0.0; 26];
            for c in text.to_lowercase().chars().filter(char::is_ascii_lowercase) {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
            Ok(v)
        }

        async fn embed_batch(&self, texts: &[String]) -> skg_core::Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimension(&self) -> usize {
            26
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn svo(subject: &str, verb: &str, object: &str) -> AnnotatedSentence {
        let rows = [(subject, "NOUN", "nsubj"), (verb, "VERB", "ROOT"), (object, "NOUN", "dobj")];
        AnnotatedSentence {
            text: format!("{subject} {verb} {object}"),
            tokens: rows
                .iter()
                .enumerate()
                .map(|(i, (text, pos, dep))| AnnotatedToken {
                    index: i,
                    text: text.to_string(),
                    pos: pos.to_string(),
                    tag: String::new(),
                    dep: dep.to_string(),
                    head: 1,
                })
                .collect(),
            ents: Vec::new(),
        }
    }

    fn setup() -> (Arc<MockAnnotator>, Models) {
        let mut parses = HashMap::new();
        for (s, v, o) in [
            ("cats", "chase", "mice"),
            ("mice", "eat", "cheese"),
            ("dogs", "chase", "cats"),
            ("birds", "sing", "songs"),
        ] {
            let sentence = svo(s, v, o);
            parses.insert(sentence.text.clone(), sentence);
        }
        let annotator = Arc::new(MockAnnotator {
            parses,
            calls: AtomicUsize::new(0),
        });
        let models = Models::new(annotator.clone(), Arc::new(MockEmbedder), 100);
        (annotator, models)
    }

    fn config(dir: &tempfile::TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.input.output_path = dir.path().join("triples_output.csv");
        config
    }

    fn input(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("input.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    const SENTENCES: &str = "id,sentence\n1,cats chase mice\n2,mice eat cheese\n3,\n4,dogs chase cats\n";

    #[tokio::test]
    async fn test_missing_column_fails_before_annotation() {
        let dir = tempfile::tempdir().unwrap();
        let (annotator, models) = setup();
        let file = input(&dir, "id,text\n1,cats chase mice\n");

        let mut out = Vec::new();
        let err = extract(&models, &config(&dir), &file, &mut out)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "File must contain a column named 'sentence'");
        assert_eq!(annotator.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("triples_output.csv").exists());
    }

    #[tokio::test]
    async fn test_extract_writes_csv_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let (annotator, models) = setup();
        let file = input(&dir, SENTENCES);
        let config = config(&dir);

        let mut out = Vec::new();
        let report = extract(&models, &config, &file, &mut out).await.unwrap();

        // The empty cell is skipped
        assert_eq!(annotator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.store.len(), 3);

        let csv = std::fs::read_to_string(&config.input.output_path).unwrap();
        assert_eq!(
            csv,
            "Entity1,Relation,Entity2\ncats,chase,mice\nmice,eat,cheese\ndogs,chase,cats\n"
        );

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("| cats | chase | mice |"));
        assert!(text.contains("3 triples from 3 sentences"));
    }

    #[tokio::test]
    async fn test_search_self_query() {
        let dir = tempfile::tempdir().unwrap();
        let (_, models) = setup();
        let file = input(&dir, SENTENCES);

        let mut out = Vec::new();
        search(&models, &config(&dir), &file, "cheese", QueryMode::TopK(1), &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("- cheese (similarity=1.000)"));
    }

    #[tokio::test]
    async fn test_ask_and_no_match() {
        let dir = tempfile::tempdir().unwrap();
        let (_, models) = setup();
        let file = input(&dir, SENTENCES);
        let config = config(&dir);

        // The question parses as "mice eat cheese": terms are its nouns
        let mut out = Vec::new();
        let answers = ask(&models, &config, &file, "mice eat cheese", &mut out)
            .await
            .unwrap();
        assert_eq!(
            answers,
            vec![
                Triple::new("cats", "chase", "mice"),
                Triple::new("mice", "eat", "cheese"),
            ]
        );

        // Parsed, but none of its nouns occur in a stored triple
        let mut out = Vec::new();
        let answers = ask(&models, &config, &file, "birds sing songs", &mut out)
            .await
            .unwrap();
        assert!(answers.is_empty());
        assert!(String::from_utf8(out).unwrap().contains(NO_MATCH));

        let mut out = Vec::new();
        let err = ask(&models, &config, &file, "unknown question", &mut out).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_link_reports_no_match() {
        let dir = tempfile::tempdir().unwrap();
        let (_, models) = setup();
        let file = input(&dir, SENTENCES);
        let options = LinkOptions {
            target: LinkTarget::Entities,
            threshold: 0.99,
            limit: None,
        };

        let mut out = Vec::new();
        link(&models, &config(&dir), &file, options, &mut out)
            .await
            .unwrap();
        assert!(String::from_utf8(out).unwrap().contains(NO_MATCH));
    }

    #[test]
    fn test_zero_link_limit_is_unlimited() {
        let mut config = AppConfig::default();
        assert_eq!(LinkOptions::from_config(&config).limit, Some(10));

        config.linking.limit = 0;
        assert_eq!(LinkOptions::from_config(&config).limit, None);

        let options = LinkOptions::from_config(&AppConfig::default());
        assert_eq!(options.with_limit(0).limit, None);
        assert_eq!(options.with_limit(3).limit, Some(3));
    }

    #[tokio::test]
    async fn test_link_with_zero_limit_reports_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let (_, models) = setup();
        // Letter overlap puts this pair near 0.83
        let file = input(&dir, "sentence\ncats chase mice\ndogs chase cats\n");
        let mut config = config(&dir);
        config.linking.limit = 0;
        config.linking.threshold = 0.5;

        let mut out = Vec::new();
        link(&models, &config, &file, LinkOptions::from_config(&config), &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains(NO_MATCH));
        assert!(text.contains("- cats chase mice <-> dogs chase cats"));
    }

    #[test]
    fn test_query_mode_selection() {
        let mut search = SearchConfig::default();
        assert_eq!(query_mode(&search, None, None), QueryMode::Threshold(0.30));
        assert_eq!(query_mode(&search, None, Some(0.5)), QueryMode::Threshold(0.5));
        assert_eq!(query_mode(&search, Some(Some(2)), None), QueryMode::TopK(2));
        assert_eq!(query_mode(&search, Some(None), None), QueryMode::TopK(5));

        search.mode = SearchMode::TopK;
        search.top_k = 3;
        assert_eq!(query_mode(&search, None, None), QueryMode::TopK(3));
    }

    #[tokio::test]
    async fn test_run_uses_configured_top_k() {
        let dir = tempfile::tempdir().unwrap();
        let (_, models) = setup();
        let file = input(&dir, SENTENCES);
        let mut config = config(&dir);
        config.search.mode = SearchMode::TopK;
        config.search.top_k = 2;

        let mut out = Vec::new();
        run_all(&models, &config, &file, Some("cats"), None, &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let (_, results) = text.split_once("## Semantic Search: cats\n\n").unwrap();
        let hits: Vec<&str> = results.lines().filter(|l| l.contains("(similarity=")).collect();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].starts_with("- cats "));
    }

    #[tokio::test]
    async fn test_analyze_empty_graph() {
        let dir = tempfile::tempdir().unwrap();
        let (_, models) = setup();
        let file = input(&dir, "sentence\n\n");

        let mut out = Vec::new();
        analyze(
            &models,
            &config(&dir),
            &file,
            CommunityAlgorithm::Louvain,
            &mut out,
        )
        .await
        .unwrap();
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("No nodes available for centrality or community analysis."));
    }

    #[tokio::test]
    async fn test_run_all() {
        let dir = tempfile::tempdir().unwrap();
        let (_, models) = setup();
        let file = input(&dir, SENTENCES);

        let mut out = Vec::new();
        run_all(
            &models,
            &config(&dir),
            &file,
            Some("cats"),
            Some("mice eat cheese"),
            &mut out,
        )
        .await
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("## Extracted Triples"));
        assert!(text.contains("## Graph Analytics"));
        assert!(text.contains("## Cross-Domain Links"));
        assert!(text.contains("## Semantic Search: cats"));
        assert!(text.contains("## Answers: mice eat cheese"));
        // The query "cats" is already an embedded entity
        assert!(text.contains("Embedding cache: "));
        assert!(!text.contains("Embedding cache: 0 hits"));
    }
}
