//! Rendering of extraction results.

use tabgrid_core::ExtractionResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one block per table
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    /// File extension for written outputs.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// Render a result in the requested format.
pub fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

/// Header line then data rows per table, tables separated by a blank line.
fn format_csv(result: &ExtractionResult) -> anyhow::Result<String> {
    let mut blocks = Vec::with_capacity(result.total_tables());

    for table in result.tables() {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(&table.headers)?;
        for row in &table.rows {
            wtr.write_record(row.values())?;
        }
        blocks.push(String::from_utf8(wtr.into_inner()?)?);
    }

    Ok(blocks.join("\n"))
}

fn format_text(result: &ExtractionResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Tables found: {}\n", result.total_tables()));

    for (i, table) in result.tables().iter().enumerate() {
        output.push_str(&format!(
            "\nTable {} ({} columns, {} rows)\n",
            i + 1,
            table.headers.len(),
            table.rows.len()
        ));
        output.push_str(&format!("  {}\n", table.headers.join(" | ")));
        for row in &table.rows {
            output.push_str(&format!("  {}\n", row.values().collect::<Vec<_>>().join(" | ")));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabgrid_core::{SourceTable, convert};

    fn sample() -> ExtractionResult {
        let table = |rows: &[&[&str]]| {
            SourceTable::from_image(
                rows.iter()
                    .map(|r| r.iter().map(|c| c.to_string()).collect())
                    .collect(),
            )
        };
        convert(&[
            table(&[&["Name", "City"], &["Ana", "Saint-Étienne"], &["Bo", "Oslo, NO"]]),
            table(&[&["Qty"], &["2"]]),
        ])
    }

    #[test]
    fn test_csv_blocks() {
        let csv = format_result(&sample(), OutputFormat::Csv).unwrap();
        assert_eq!(
            csv,
            "Name,City\nAna,Saint-Étienne\nBo,\"Oslo, NO\"\n\nQty\n2\n"
        );
    }

    #[test]
    fn test_json_keeps_non_ascii() {
        let json = format_result(&sample(), OutputFormat::Json).unwrap();
        assert!(json.contains("Saint-Étienne"));
        assert!(json.contains("\"total_tables\": 2"));
    }

    #[test]
    fn test_text_summary() {
        let text = format_result(&sample(), OutputFormat::Text).unwrap();
        assert!(text.starts_with("Tables found: 2\n"));
        assert!(text.contains("Table 1 (2 columns, 2 rows)"));
        assert!(text.contains("  Ana | Saint-Étienne\n"));
    }

    #[test]
    fn test_empty_result() {
        let empty = ExtractionResult::empty();
        assert_eq!(format_result(&empty, OutputFormat::Csv).unwrap(), "");
        assert_eq!(format_result(&empty, OutputFormat::Text).unwrap(), "Tables found: 0\n");
    }
}
