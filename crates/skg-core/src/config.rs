//! SKG Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for local development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Input table and output artifact
    pub input: InputConfig,

    /// Dependency annotator service
    pub annotator: AnnotatorConfig,

    /// Sentence embedding provider
    pub embedding: EmbeddingConfig,

    /// Semantic search parameters
    pub search: SearchConfig,

    /// Pairwise domain linking parameters
    pub linking: LinkingConfig,

    /// Graph analytics parameters
    pub analytics: AnalyticsConfig,

    /// Relation extraction options
    pub extraction: ExtractionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Input
        if let Ok(column) = std::env::var("SKG_SENTENCE_COLUMN") {
            config.input.sentence_column = column;
        }
        if let Ok(path) = std::env::var("SKG_OUTPUT_PATH") {
            config.input.output_path = PathBuf::from(path);
        }

        // Annotator
        if let Ok(url) = std::env::var("ANNOTATOR_URL") {
            config.annotator.url = url;
        }
        if let Ok(model) = std::env::var("ANNOTATOR_MODEL") {
            config.annotator.model = model;
        }

        // Embedding
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider.parse()?;
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.embedding.ollama_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }

        // Search and linking
        if let Ok(mode) = std::env::var("SEARCH_MODE") {
            config.search.mode = mode.parse()?;
        }
        if let Ok(value) = std::env::var("SEARCH_THRESHOLD") {
            config.search.threshold = parse_threshold("SEARCH_THRESHOLD", &value)?;
        }
        if let Ok(value) = std::env::var("LINK_THRESHOLD") {
            config.linking.threshold = parse_threshold("LINK_THRESHOLD", &value)?;
        }

        // Analytics
        if let Ok(algorithm) = std::env::var("COMMUNITY_ALGORITHM") {
            config.analytics.algorithm = algorithm.parse()?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;
        let defaults = Self::default();

        // Only override if env values differ from defaults
        if env_config.input.sentence_column != defaults.input.sentence_column {
            self.input.sentence_column = env_config.input.sentence_column;
        }
        if env_config.input.output_path != defaults.input.output_path {
            self.input.output_path = env_config.input.output_path;
        }
        if env_config.annotator.url != defaults.annotator.url {
            self.annotator.url = env_config.annotator.url;
        }
        if env_config.annotator.model != defaults.annotator.model {
            self.annotator.model = env_config.annotator.model;
        }
        if env_config.embedding.provider != defaults.embedding.provider {
            self.embedding.provider = env_config.embedding.provider;
        }
        if env_config.embedding.ollama_url != defaults.embedding.ollama_url {
            self.embedding.ollama_url = env_config.embedding.ollama_url;
        }
        if env_config.embedding.model != defaults.embedding.model {
            self.embedding.model = env_config.embedding.model;
        }
        if env_config.search.mode != defaults.search.mode {
            self.search.mode = env_config.search.mode;
        }
        if env_config.search.threshold != defaults.search.threshold {
            self.search.threshold = env_config.search.threshold;
        }
        if env_config.linking.threshold != defaults.linking.threshold {
            self.linking.threshold = env_config.linking.threshold;
        }
        if env_config.analytics.algorithm != defaults.analytics.algorithm {
            self.analytics.algorithm = env_config.analytics.algorithm;
        }
        if env_config.logging.level != defaults.logging.level {
            self.logging.level = env_config.logging.level;
        }

        Ok(self)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_threshold("search.threshold", self.search.threshold)?;
        check_threshold("linking.threshold", self.linking.threshold)?;
        if self.search.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "search.top_k".to_string(),
                value: "0".to_string(),
            });
        }
        if self.input.sentence_column.is_empty() {
            return Err(ConfigError::MissingRequired(
                "input.sentence_column".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_threshold(key: &str, value: &str) -> Result<f32, ConfigError> {
    let parsed: f32 = value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })?;
    check_threshold(key, parsed)?;
    Ok(parsed)
}

fn check_threshold(key: &str, value: f32) -> Result<(), ConfigError> {
    // Cosine similarity lives in [-1, 1].
    if !(-1.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Input table and output artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Name of the column holding the sentences
    pub sentence_column: String,

    /// Triple file written on every extraction run
    pub output_path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            sentence_column: "sentence".to_string(),
            output_path: PathBuf::from("triples_output.csv"),
        }
    }
}

/// Dependency annotator service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Endpoint returning spaCy `Doc.to_json()` documents
    pub url: String,

    /// Pipeline name requested from the service
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8090/parse".to_string(),
            model: "en_core_web_sm".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Sentence embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding provider to use
    pub provider: EmbeddingProvider,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name (all-MiniLM-L6-v2 is served by Ollama as `all-minilm`)
    pub model: String,

    /// Maximum number of cached vectors per process
    pub cache_capacity: u64,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            ollama_url: "http://localhost:11434".to_string(),
            model: "all-minilm".to_string(),
            cache_capacity: 10_000,
            timeout_secs: 60,
        }
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Ollama HTTP API
    Ollama,
    /// In-process ONNX model on CPU (requires the `local` feature)
    Local,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "local" | "fastembed" => Ok(Self::Local),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Semantic search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Result selection used when no flag overrides it
    pub mode: SearchMode,

    /// Number of results in top-k mode
    pub top_k: usize,

    /// Minimum cosine similarity in threshold mode
    pub threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Threshold,
            top_k: 5,
            threshold: 0.30,
        }
    }
}

/// How search results are selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Every candidate above `search.threshold`
    Threshold,
    /// The `search.top_k` most similar candidates
    #[serde(rename = "topk", alias = "top_k")]
    TopK,
}

impl std::str::FromStr for SearchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "threshold" => Ok(Self::Threshold),
            "topk" | "top_k" | "top-k" => Ok(Self::TopK),
            _ => Err(ConfigError::InvalidValue {
                key: "SEARCH_MODE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Pairwise similarity linking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkingConfig {
    /// Minimum cosine similarity for a link
    pub threshold: f32,

    /// Maximum number of sentence links reported (0 = unlimited)
    pub limit: usize,

    /// What gets linked
    pub target: LinkTarget,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            limit: 10,
            target: LinkTarget::Triples,
        }
    }
}

/// Candidates compared pairwise during linking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkTarget {
    /// Distinct entity nodes
    Entities,
    /// Synthesized "subject predicate object" sentences
    Triples,
}

impl std::str::FromStr for LinkTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "entities" | "nodes" => Ok(Self::Entities),
            "triples" => Ok(Self::Triples),
            _ => Err(ConfigError::InvalidValue {
                key: "linking.target".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Graph analytics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Community detection algorithm
    pub algorithm: CommunityAlgorithm,

    /// Number of top nodes reported by degree centrality
    pub top_n: usize,

    /// Maximum members printed per community
    pub display_limit: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            algorithm: CommunityAlgorithm::GreedyModularity,
            top_n: 5,
            display_limit: 10,
        }
    }
}

/// Community detection algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunityAlgorithm {
    /// Clauset-Newman-Moore greedy modularity agglomeration
    #[serde(rename = "greedy")]
    GreedyModularity,
    /// Louvain modularity optimization
    Louvain,
}

impl std::str::FromStr for CommunityAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "greedy" | "greedy_modularity" | "cnm" => Ok(Self::GreedyModularity),
            "louvain" => Ok(Self::Louvain),
            _ => Err(ConfigError::InvalidValue {
                key: "COMMUNITY_ALGORITHM".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for CommunityAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreedyModularity => write!(f, "greedy"),
            Self::Louvain => write!(f, "louvain"),
        }
    }
}

/// Relation extraction options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Lowercase entities and strip a leading "the "
    pub normalize_entities: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.input.sentence_column, "sentence");
        assert_eq!(config.input.output_path, PathBuf::from("triples_output.csv"));
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.linking.limit, 10);
        assert_eq!(config.embedding.model, "all-minilm");
        assert!(!config.extraction.normalize_entities);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(
            "ollama".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Ollama
        );
        assert_eq!(
            "FastEmbed".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Local
        );
        assert!("openai".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!(
            "louvain".parse::<CommunityAlgorithm>().unwrap(),
            CommunityAlgorithm::Louvain
        );
        assert_eq!(
            "greedy".parse::<CommunityAlgorithm>().unwrap(),
            CommunityAlgorithm::GreedyModularity
        );
        assert!("spectral".parse::<CommunityAlgorithm>().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [search]
            threshold = 0.6

            [analytics]
            algorithm = "louvain"
            "#,
        )
        .unwrap();

        assert_eq!(config.search.threshold, 0.6);
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.search.mode, SearchMode::Threshold);
        assert_eq!(config.analytics.algorithm, CommunityAlgorithm::Louvain);
        assert_eq!(config.linking.threshold, 0.75);
    }

    #[test]
    fn test_search_mode_from_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [search]
            mode = "topk"
            top_k = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.search.mode, SearchMode::TopK);
        assert_eq!(config.search.top_k, 3);
        assert_eq!("top-k".parse::<SearchMode>().unwrap(), SearchMode::TopK);
        assert!("nearest".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_from_file_rejects_out_of_range_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skg.toml");
        std::fs::write(&path, "[linking]\nthreshold = 1.5\n").unwrap();

        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "linking.threshold"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/nonexistent/skg.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("X", "0.3").unwrap(), 0.3);
        assert!(parse_threshold("X", "abc").is_err());
        assert!(parse_threshold("X", "-2").is_err());
    }
}
