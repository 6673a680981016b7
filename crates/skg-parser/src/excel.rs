//! Excel table parser using calamine
//!
//! Reads the first sheet of an XLSX/XLS workbook (or a named sheet) as a
//! table whose first row is the header.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use skg_core::Table;

use crate::{FileType, ParserError, Result, TableParser};

/// Excel table parser
pub struct ExcelParser {
    /// Sheet to read (None = first sheet)
    pub sheet: Option<String>,
}

impl ExcelParser {
    /// Create a new Excel parser reading the first sheet
    pub fn new() -> Self {
        Self { sheet: None }
    }

    /// Read a specific sheet
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Convert a Data cell to an optional string; empty cells are missing
    fn cell_to_string(cell: &Data) -> Option<String> {
        match cell {
            Data::Empty => None,
            Data::String(s) => Some(s.clone()),
            Data::Float(f) => {
                // Format without unnecessary decimals
                if f.fract() == 0.0 {
                    Some(format!("{}", *f as i64))
                } else {
                    Some(format!("{f}"))
                }
            }
            Data::Int(i) => Some(format!("{i}")),
            Data::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Data::Error(_) => None,
            Data::DateTime(dt) => Some(format!("{dt}")),
            Data::DateTimeIso(s) => Some(s.clone()),
            Data::DurationIso(s) => Some(s.clone()),
        }
    }

    /// Build a table from a worksheet range
    fn range_to_table(sheet_name: &str, range: &calamine::Range<Data>) -> Table {
        let mut table = Table::new();
        table.caption = Some(sheet_name.to_string());

        let mut rows_iter = range.rows();

        if let Some(first_row) = rows_iter.next() {
            table.headers = first_row
                .iter()
                .map(|c| Self::cell_to_string(c).unwrap_or_default())
                .collect();
        }

        // Fully empty rows carry no values
        table.rows = rows_iter
            .map(|row| row.iter().map(Self::cell_to_string).collect::<Vec<_>>())
            .filter(|row: &Vec<Option<String>>| row.iter().any(Option::is_some))
            .collect();

        table
    }
}

impl Default for ExcelParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TableParser for ExcelParser {
    fn parse(&self, path: &Path) -> Result<Table> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| ParserError::ExcelError(e.to_string()))?;

        let sheet_name = match &self.sheet {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| ParserError::EmptyTable(path.display().to_string()))?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ParserError::ExcelError(e.to_string()))?;

        Ok(Self::range_to_table(&sheet_name, &range))
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Xlsx, FileType::Xls]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excel_parser_creation() {
        let parser = ExcelParser::new();
        assert!(parser.sheet.is_none());

        let parser = parser.with_sheet("Sheet1");
        assert_eq!(parser.sheet.as_deref(), Some("Sheet1"));
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(ExcelParser::cell_to_string(&Data::Empty), None);
        assert_eq!(
            ExcelParser::cell_to_string(&Data::String("test".to_string())),
            Some("test".to_string())
        );
        assert_eq!(ExcelParser::cell_to_string(&Data::Int(42)).as_deref(), Some("42"));
        assert_eq!(ExcelParser::cell_to_string(&Data::Float(3.5)).as_deref(), Some("3.5"));
        assert_eq!(ExcelParser::cell_to_string(&Data::Float(10.0)).as_deref(), Some("10"));
        assert_eq!(ExcelParser::cell_to_string(&Data::Bool(true)).as_deref(), Some("TRUE"));
    }

    #[test]
    fn test_range_to_table() {
        let mut range = calamine::Range::new((0, 0), (3, 1));
        range.set_value((0, 0), Data::String("id".into()));
        range.set_value((0, 1), Data::String("sentence".into()));
        range.set_value((1, 0), Data::Int(1));
        range.set_value((1, 1), Data::String("The cat chased the mouse.".into()));
        range.set_value((2, 0), Data::Int(2));
        // (2, 1) stays empty; row 3 is fully empty

        let table = ExcelParser::range_to_table("Sheet1", &range);
        assert_eq!(table.headers, vec!["id", "sentence"]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(
            table.column_values("sentence").unwrap(),
            vec!["The cat chased the mouse."]
        );
    }

    #[test]
    fn test_supported_types() {
        let parser = ExcelParser::new();
        assert!(parser.can_parse(FileType::Xlsx));
        assert!(parser.can_parse(FileType::Xls));
        assert!(!parser.can_parse(FileType::Csv));
    }
}
