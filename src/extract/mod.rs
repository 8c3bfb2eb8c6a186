//! Document extraction adapters.
//!
//! Reads the report inputs: page text from specification PDFs and rows from
//! design spreadsheets. Every failure is an [`ExtractError`] naming the file,
//! so callers can report it and carry on with the remaining inputs.

pub mod pdf;
pub mod spreadsheet;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ExtractError;

pub use pdf::extract_pdf_text;
pub use spreadsheet::extract_spreadsheet;

/// Default number of PDF pages taken into a report.
pub const DEFAULT_PDF_PAGES: usize = 3;

/// Ordered page texts of one PDF.
#[derive(Clone, Debug, PartialEq)]
pub struct PdfText {
    pub source: PathBuf,
    pub pages: Vec<String>,
}

/// Rows of a spreadsheet, keyed by the header row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row `index` as a column-name → value mapping.
    pub fn row_map(&self, index: usize) -> Option<BTreeMap<&str, &str>> {
        let row = self.rows.get(index)?;
        Some(
            self.columns
                .iter()
                .zip(row.iter())
                .map(|(c, v)| (c.as_str(), v.as_str()))
                .collect(),
        )
    }

    /// Stacks several tables. Columns are the union in first-seen order and
    /// cells a table does not have are left empty.
    pub fn concat(tables: &[Table]) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for table in tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for table in tables {
            let positions: Vec<usize> = table
                .columns
                .iter()
                .filter_map(|c| columns.iter().position(|x| x == c))
                .collect();
            for row in &table.rows {
                let mut merged = vec![String::new(); columns.len()];
                for (value, &pos) in row.iter().zip(positions.iter()) {
                    merged[pos] = value.clone();
                }
                rows.push(merged);
            }
        }

        Table { columns, rows }
    }
}

/// Extracted content of one input file.
#[derive(Clone, Debug, PartialEq)]
pub enum ExtractedDocument {
    Pdf(PdfText),
    Spreadsheet(Table),
}

/// Extracts a document, choosing the adapter by file extension.
pub fn extract_document(path: &Path, max_pdf_pages: usize) -> Result<ExtractedDocument, ExtractError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => Ok(ExtractedDocument::Pdf(extract_pdf_text(path, max_pdf_pages)?)),
        "xlsx" | "xlsm" | "xls" => Ok(ExtractedDocument::Spreadsheet(extract_spreadsheet(path)?)),
        _ => Err(ExtractError::UnsupportedType(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_row_map() {
        let t = table(&["Part", "Material"], &[&["Shaft", "42CrMo4"]]);
        let row = t.row_map(0).unwrap();
        assert_eq!(row["Part"], "Shaft");
        assert_eq!(row["Material"], "42CrMo4");
        assert!(t.row_map(1).is_none());
    }

    #[test]
    fn test_concat_unions_columns() {
        let a = table(&["Part", "Qty"], &[&["Bolt", "4"]]);
        let b = table(&["Part", "Finish"], &[&["Plate", "Zinc"], &["Pin", ""]]);
        let merged = Table::concat(&[a, b]);
        assert_eq!(merged.columns, vec!["Part", "Qty", "Finish"]);
        assert_eq!(merged.rows.len(), 3);
        assert_eq!(merged.rows[0], vec!["Bolt", "4", ""]);
        assert_eq!(merged.rows[1], vec!["Plate", "", "Zinc"]);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = extract_document(Path::new("notes.docx"), DEFAULT_PDF_PAGES).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedType(_)));
    }
}
