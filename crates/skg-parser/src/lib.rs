//! SKG Parser - Tabular sentence sources
//!
//! Supports loading of:
//! - CSV files
//! - Microsoft Excel (XLSX, XLS)
//!
//! Each parser implements the `TableParser` trait and produces a
//! `skg_core::Table`. The sentence source is the ordered, non-missing
//! values of one designated column of that table.

use std::path::Path;

use skg_core::{SkgError, Table};
use thiserror::Error;
use tracing::info;

pub mod excel;

pub use excel::ExcelParser;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading an input table
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    CsvError(String),

    /// Excel parsing error
    #[error("Excel parsing error: {0}")]
    ExcelError(String),

    /// The workbook has no readable sheet
    #[error("No readable table in {0}")]
    EmptyTable(String),

    /// Required column is absent
    #[error("File must contain a column named '{0}'")]
    MissingColumn(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;

impl From<ParserError> for SkgError {
    fn from(err: ParserError) -> Self {
        match err {
            ParserError::MissingColumn(column) => SkgError::MissingColumn(column),
            ParserError::IoError { path, source } => SkgError::Io { path, source },
            other => SkgError::InvalidInput(other.to_string()),
        }
    }
}

// ============================================================================
// File Types
// ============================================================================

/// Supported input file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Xlsx,
    Xls,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "csv" => Self::Csv,
            "xlsx" => Self::Xlsx,
            "xls" => Self::Xls,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Xlsx => write!(f, "xlsx"),
            Self::Xls => write!(f, "xls"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for table parsers
pub trait TableParser: Send + Sync {
    /// Load a table from a file path; the first row is the header
    fn parse(&self, path: &Path) -> Result<Table>;

    /// Get supported file types
    fn supported_types(&self) -> &[FileType];

    /// Check if this parser can handle a file type
    fn can_parse(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

// ============================================================================
// CSV
// ============================================================================

/// CSV table parser
///
/// An empty field is a missing value, matching how spreadsheet tools read
/// blank CSV cells.
pub struct CsvParser {
    delimiter: u8,
}

impl CsvParser {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Use a different field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Parse CSV from any reader
    pub fn parse_reader<R: std::io::Read>(&self, reader: R) -> Result<Table> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| ParserError::CsvError(e.to_string()))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut table = Table::new().with_headers(headers);
        for record in rdr.records() {
            let record = record.map_err(|e| ParserError::CsvError(e.to_string()))?;
            table.add_row(
                record
                    .iter()
                    .map(|field| (!field.is_empty()).then(|| field.to_string()))
                    .collect(),
            );
        }

        Ok(table)
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TableParser for CsvParser {
    fn parse(&self, path: &Path) -> Result<Table> {
        let file = std::fs::File::open(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut table = self.parse_reader(file)?;
        table.caption = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(table)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Csv]
    }
}

// ============================================================================
// Parser Registry
// ============================================================================

/// Registry of available parsers
pub struct ParserRegistry {
    parsers: Vec<Box<dyn TableParser>>,
}

impl ParserRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Registry with the CSV and Excel parsers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(CsvParser::new());
        registry.register(ExcelParser::new());
        registry
    }

    /// Register a parser
    pub fn register<P: TableParser + 'static>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
    }

    /// Find a parser for a file type
    pub fn find_parser(&self, file_type: FileType) -> Option<&dyn TableParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(file_type))
            .map(|p| p.as_ref())
    }

    /// Parse a file using the appropriate parser
    pub fn parse(&self, path: &Path) -> Result<Table> {
        let file_type = FileType::from_path(path);

        if file_type == FileType::Unknown {
            return Err(ParserError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            ));
        }

        let parser = self
            .find_parser(file_type)
            .ok_or_else(|| ParserError::UnsupportedFormat(file_type.to_string()))?;

        parser.parse(path)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// Sentence Source
// ============================================================================

/// Load the non-missing values of `column` from a CSV or Excel file
///
/// Fails with `MissingColumn` before anything else happens when the column
/// is absent.
pub fn load_sentences(path: &Path, column: &str) -> Result<Vec<String>> {
    let table = ParserRegistry::with_defaults().parse(path)?;
    let sentences = table
        .column_values(column)
        .map_err(|_| ParserError::MissingColumn(column.to_string()))?;

    info!(
        path = %path.display(),
        rows = table.num_rows(),
        sentences = sentences.len(),
        "loaded sentence column"
    );
    Ok(sentences)
}

// ============================================================================
// Tests
// ============================================================================
