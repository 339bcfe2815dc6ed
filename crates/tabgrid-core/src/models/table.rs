//! Table data model: raw cell matrices and header-keyed records.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A table as rows of recognized or extracted text, before header conversion.
///
/// Rows may be ragged until padded by the assembler.
pub type RawTable = Vec<Vec<String>>;

/// A raw table together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    /// Page number (1-indexed) for PDF tables.
    pub page: Option<u32>,
    /// Index of the table among the accepted tables of its page (1-indexed).
    pub table_index: usize,
    /// Cell text, first row holds the headers.
    pub data: RawTable,
}

impl SourceTable {
    /// Table found on a standalone image.
    pub fn from_image(data: RawTable) -> Self {
        Self {
            page: None,
            table_index: 1,
            data,
        }
    }

    /// Table found on a PDF page.
    pub fn from_page(page: u32, table_index: usize, data: RawTable) -> Self {
        Self {
            page: Some(page),
            table_index,
            data,
        }
    }
}

/// One data row of a [`TableRecord`], keyed by header in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordRow {
    entries: Vec<(String, String)>,
}

impl RecordRow {
    pub(crate) fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// Value stored under `header`.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == header)
            .map(|(_, value)| value.as_str())
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the row has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in header order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Values in header order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, value)| value.as_str())
    }

    /// `(header, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for RecordRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Final header-keyed representation of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRecord {
    /// Column headers, unique within the table.
    pub headers: Vec<String>,
    /// Data rows with at least one non-empty value.
    pub rows: Vec<RecordRow>,
}

/// Result of processing one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    total_tables: usize,
    tables: Vec<TableRecord>,
}

impl ExtractionResult {
    /// Result with no tables.
    pub fn empty() -> Self {
        Self {
            total_tables: 0,
            tables: Vec::new(),
        }
    }

    /// Build a result; the count always matches the tables.
    pub fn from_tables(tables: Vec<TableRecord>) -> Self {
        Self {
            total_tables: tables.len(),
            tables,
        }
    }

    /// Number of tables.
    pub fn total_tables(&self) -> usize {
        self.total_tables
    }

    /// The extracted tables.
    pub fn tables(&self) -> &[TableRecord] {
        &self.tables
    }

    /// Whether no table was found.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_serializes_in_header_order() {
        let row = RecordRow::new(vec![
            ("Zeta".to_string(), "1".to_string()),
            ("Alpha".to_string(), "2".to_string()),
        ]);

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Zeta":"1","Alpha":"2"}"#);
    }

    #[test]
    fn test_empty_result_shape() {
        let json = serde_json::to_value(ExtractionResult::empty()).unwrap();
        assert_eq!(json, serde_json::json!({"total_tables": 0, "tables": []}));
    }
}
