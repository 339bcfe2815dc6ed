//! Raw cell matrices to header-keyed records.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::models::table::{ExtractionResult, RawTable, RecordRow, SourceTable, TableRecord};
use crate::text::clean;

/// Convert every non-empty table into a [`TableRecord`].
pub fn convert(tables: &[SourceTable]) -> ExtractionResult {
    let records: Vec<TableRecord> = tables
        .iter()
        .filter_map(|table| {
            let record = convert_table(&table.data);
            if record.is_none() {
                debug!(
                    "Skipping empty table {} (page {:?})",
                    table.table_index, table.page
                );
            }
            record
        })
        .collect();

    info!("Converted {} of {} tables", records.len(), tables.len());
    ExtractionResult::from_tables(records)
}

/// Convert one matrix; its first row supplies the headers.
///
/// Returns `None` for an empty matrix. Rows whose values are all empty after
/// cleaning are dropped; a table may end up with no rows.
pub fn convert_table(data: &RawTable) -> Option<TableRecord> {
    let (header_row, body) = data.split_first()?;
    let headers = headers(header_row);

    let rows = body
        .iter()
        .filter_map(|row| {
            let entries: Vec<(String, String)> = headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let value = row.get(i).map(|cell| clean(cell)).unwrap_or_default();
                    (header.clone(), value)
                })
                .collect();

            entries
                .iter()
                .any(|(_, value)| !value.is_empty())
                .then(|| RecordRow::new(entries))
        })
        .collect();

    Some(TableRecord { headers, rows })
}

/// Cleaned headers, `col_<i>` for blanks, `_<n>` suffixes for repeats.
fn headers(row: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();

    row.iter()
        .enumerate()
        .map(|(i, cell)| {
            let base = match clean(cell) {
                text if text.is_empty() => format!("col_{}", i),
                text => text,
            };

            let mut header = base.clone();
            let mut n = 2;
            while !seen.insert(header.clone()) {
                header = format!("{}_{}", base, n);
                n += 1;
            }
            header
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn matrix(rows: &[&[&str]]) -> RawTable {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_blank_rows_are_dropped() {
        let result = convert(&[SourceTable::from_image(matrix(&[
            &["Name", "Age"],
            &["Ana", "30"],
            &["", ""],
        ]))]);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "total_tables": 1,
                "tables": [{"headers": ["Name", "Age"], "rows": [{"Name": "Ana", "Age": "30"}]}]
            })
        );
    }

    #[test]
    fn test_blank_header_is_synthesized() {
        let record = convert_table(&matrix(&[&["", "Age"], &["x", "1"]])).unwrap();
        assert_eq!(record.headers, vec!["col_0", "Age"]);
        assert_eq!(record.rows[0].get("col_0"), Some("x"));
    }

    #[test]
    fn test_headers_and_cells_are_cleaned() {
        let record = convert_table(&matrix(&[
            &["| Unit   price |", "__Qty"],
            &["[ 12.50 ]", "3  "],
        ]))
        .unwrap();

        assert_eq!(record.headers, vec!["Unit price", "Qty"]);
        assert_eq!(record.rows[0].get("Unit price"), Some("12.50"));
        assert_eq!(record.rows[0].get("Qty"), Some("3"));
    }

    #[test]
    fn test_every_row_has_every_header() {
        let record = convert_table(&matrix(&[
            &["A", "B", "C"],
            &["1"],
            &["1", "2", "3", "4"],
        ]))
        .unwrap();

        assert_eq!(record.rows.len(), 2);
        for row in &record.rows {
            assert_eq!(row.keys().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        }
        assert_eq!(record.rows[0].get("C"), Some(""));
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let record = convert_table(&matrix(&[
            &["Amount", "Amount", "", "Amount"],
            &["1", "2", "3", "4"],
        ]))
        .unwrap();

        assert_eq!(record.headers, vec!["Amount", "Amount_2", "col_2", "Amount_3"]);
        assert_eq!(record.rows[0].len(), 4);
    }

    #[test]
    fn test_empty_tables() {
        let header_only = SourceTable::from_page(1, 1, matrix(&[&["A", "B"]]));
        let empty = SourceTable::from_page(1, 2, Vec::new());

        let result = convert(&[header_only, empty]);
        assert_eq!(result.total_tables(), 1);
        assert_eq!(result.tables()[0].headers, vec!["A", "B"]);
        assert!(result.tables()[0].rows.is_empty());
    }
}
