//! SKG Core - Domain models, errors, and shared types
//!
//! This crate defines the core abstractions used throughout the SKG workspace:
//! - Knowledge graph models (triples, edges)
//! - The append-only triple store and its CSV format
//! - Display tables
//! - Common error types
//! - Configuration management

pub mod config;
pub mod store;

pub use config::{
    AnalyticsConfig, AnnotatorConfig, AppConfig, CommunityAlgorithm, ConfigError,
    EmbeddingConfig, EmbeddingProvider, ExtractionConfig, InputConfig, LinkTarget, LinkingConfig,
    LoggingConfig, SearchConfig, SearchMode,
};
pub use store::TripleStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for SKG operations
#[derive(Error, Debug)]
pub enum SkgError {
    #[error("File must contain a column named '{0}'")]
    MissingColumn(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Annotation error: {0}")]
    Annotation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Analytics error: {0}")]
    Analytics(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<csv::Error> for SkgError {
    fn from(err: csv::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SkgError>;

// ============================================================================
// Knowledge Graph Models
// ============================================================================

/// A relationship triple (Subject, Predicate, Object)
///
/// Serialized with the column names of the exported triple file:
/// `Entity1`, `Relation`, `Entity2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Subject entity text
    #[serde(rename = "Entity1")]
    pub subject: String,

    /// Predicate (surface text of the verb)
    #[serde(rename = "Relation")]
    pub predicate: String,

    /// Object entity text
    #[serde(rename = "Entity2")]
    pub object: String,
}

impl Triple {
    /// Create a new triple
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Synthesized "subject predicate object" sentence used for embedding
    pub fn sentence(&self) -> String {
        format!("{} {} {}", self.subject, self.predicate, self.object)
    }

    /// Apply entity normalization to subject and object (predicate untouched)
    pub fn normalized(&self) -> Self {
        Self {
            subject: normalize_entity(&self.subject),
            predicate: self.predicate.clone(),
            object: normalize_entity(&self.object),
        }
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.predicate, self.object)
    }
}

/// A directed, labelled edge between two entity nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    /// Predicate carried by the relation
    pub label: String,
}

impl From<&Triple> for Edge {
    fn from(t: &Triple) -> Self {
        Self {
            source: t.subject.clone(),
            target: t.object.clone(),
            label: t.predicate.clone(),
        }
    }
}

/// Lowercase an entity and strip one leading "the "
pub fn normalize_entity(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    match lowered.strip_prefix("the ") {
        Some(rest) => rest.trim_start().to_string(),
        None => lowered,
    }
}

// ============================================================================
// Display Tables
// ============================================================================

/// A row-oriented table with named columns
///
/// Cells are optional so that missing values survive loading; a missing
/// cell is `None`, never an empty string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Table caption (sheet name, file name)
    pub caption: Option<String>,

    /// Column headers
    pub headers: Vec<String>,

    /// Table rows
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Create a new table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add headers
    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }

    /// Set the caption
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Add a row
    pub fn add_row(&mut self, row: Vec<Option<String>>) {
        self.rows.push(row);
    }

    /// Get number of columns
    pub fn num_columns(&self) -> usize {
        self.headers
            .len()
            .max(self.rows.first().map(|r| r.len()).unwrap_or(0))
    }

    /// Get number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by exact header name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Non-missing values of a column, in row order
    ///
    /// Rows shorter than the header count as missing for that column.
    pub fn column_values(&self, name: &str) -> Result<Vec<String>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| SkgError::MissingColumn(name.to_string()))?;

        Ok(self
            .rows
            .iter()
            .filter_map(|row| row.get(idx).cloned().flatten())
            .collect())
    }

    /// Convert to markdown format
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        if !self.headers.is_empty() {
            md.push('|');
            for h in &self.headers {
                md.push_str(&format!(" {h} |"));
            }
            md.push('\n');

            md.push('|');
            for _ in &self.headers {
                md.push_str(" --- |");
            }
            md.push('\n');
        }

        for row in &self.rows {
            md.push('|');
            for cell in row {
                md.push_str(&format!(" {} |", cell.as_deref().unwrap_or("")));
            }
            md.push('\n');
        }

        md
    }
}

// ============================================================================
// Tests
// ============================================================================
