//! Core library for table extraction from scanned images and ruled PDFs.
//!
//! This crate provides:
//! - Grid detection on page images (line intersections or cell contours)
//! - Per-cell OCR through a pluggable [`TextEngine`]
//! - Ruled-table extraction from PDF vector content
//! - Validation and conversion of cell matrices into header-keyed records

pub mod error;
pub mod grid;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod table;
pub mod text;

pub use error::{Result, TabgridError};
pub use grid::{CellRect, GridAxes, GridDetector, GridStrategy, Lattice};
pub use models::config::TabgridConfig;
pub use models::table::{ExtractionResult, RawTable, RecordRow, SourceTable, TableRecord};
pub use ocr::{CellRecognizer, RecognitionMode, TesseractEngine, TextEngine, create_engine};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use pdf::{LatticePdfExtractor, PdfPageTables, PdfTableSource};
pub use pipeline::{FormatHint, Pipeline, SUPPORTED_EXTENSIONS};
pub use table::{TableAssembler, TableValidator, convert};
pub use text::clean;
