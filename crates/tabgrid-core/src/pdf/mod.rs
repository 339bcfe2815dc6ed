//! Ruled-table extraction from PDF vector content.
//!
//! PDF tables bypass the image pipeline: ruling lines and text are read
//! straight from the page content streams.

mod content;
mod extractor;
mod lattice;

pub use extractor::LatticePdfExtractor;
#[cfg(test)]
pub(crate) use extractor::testing;

use crate::error::PdfError;
use crate::models::table::RawTable;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Tables found on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfPageTables {
    /// Page number (1-indexed).
    pub page: u32,
    /// Cell matrices in reading order.
    pub tables: Vec<RawTable>,
}

/// A source of table cell matrices for PDF documents.
pub trait PdfTableSource: Send + Sync {
    /// Extract the tables of every page.
    fn extract_tables(&self, data: &[u8]) -> Result<Vec<PdfPageTables>>;
}
