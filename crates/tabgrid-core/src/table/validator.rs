//! Plausibility check for extracted cell matrices.

use tracing::debug;

use crate::models::config::ValidationConfig;
use crate::models::table::RawTable;

/// Accepts or rejects a raw cell matrix as a table.
#[derive(Debug, Clone, Default)]
pub struct TableValidator {
    config: ValidationConfig,
}

impl TableValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Whether `table` looks like a real table.
    ///
    /// Rejects tables with too few rows, a low mean column count, a column
    /// count variance above the mean, or too many blank cells.
    pub fn is_valid(&self, table: &RawTable) -> bool {
        if table.len() < self.config.min_rows {
            debug!("Rejected table: {} rows", table.len());
            return false;
        }

        let counts: Vec<f64> = table.iter().map(|row| row.len() as f64).collect();
        let rows = counts.len() as f64;
        let mean = counts.iter().sum::<f64>() / rows;
        let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / rows;

        if variance > mean * self.config.max_variance_ratio {
            debug!("Rejected table: column variance {:.2} > mean {:.2}", variance, mean);
            return false;
        }

        if mean < self.config.min_mean_columns {
            debug!("Rejected table: mean column count {:.2}", mean);
            return false;
        }

        let total: usize = table.iter().map(Vec::len).sum();
        let empty = table
            .iter()
            .flatten()
            .filter(|cell| cell.trim().is_empty())
            .count();
        let empty_ratio = empty as f64 / total as f64;

        if empty_ratio > self.config.max_empty_ratio {
            debug!("Rejected table: {:.0}% empty cells", empty_ratio * 100.0);
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(lengths: &[usize], fill: &str) -> RawTable {
        lengths
            .iter()
            .map(|&n| vec![fill.to_string(); n])
            .collect()
    }

    #[test]
    fn test_consistent_table_is_valid() {
        let validator = TableValidator::default();
        assert!(validator.is_valid(&table(&[3, 3, 3, 3], "x")));
    }

    #[test]
    fn test_incoherent_column_counts() {
        let validator = TableValidator::default();
        // mean 3.25, variance 5.6875
        assert!(!validator.is_valid(&table(&[1, 5, 1, 6], "x")));
    }

    #[test]
    fn test_single_row() {
        let validator = TableValidator::default();
        assert!(!validator.is_valid(&table(&[4], "x")));
        assert!(!validator.is_valid(&Vec::new()));
    }

    #[test]
    fn test_single_column() {
        let validator = TableValidator::default();
        assert!(!validator.is_valid(&table(&[1, 1, 1], "x")));
    }

    #[test]
    fn test_empty_ratio() {
        let validator = TableValidator::default();

        // 9 of 12 cells blank: 75%
        let mut sparse = table(&[3, 3, 3, 3], " ");
        sparse[0] = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(!validator.is_valid(&sparse));

        // 8 of 12 cells blank: 67%
        sparse[1][0] = "d".to_string();
        assert!(validator.is_valid(&sparse));
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let validator = TableValidator::new(ValidationConfig {
            min_rows: 1,
            min_mean_columns: 1.0,
            ..ValidationConfig::default()
        });
        assert!(validator.is_valid(&table(&[1], "x")));
    }
}
