//! Walks a detected lattice and recognizes every cell.

use image::DynamicImage;
use tracing::{debug, trace};

use crate::error::Result;
use crate::grid::Lattice;
use crate::models::table::RawTable;
use crate::ocr::{CellRecognizer, TextEngine};

/// Builds a raw cell matrix from a page image and its lattice.
pub struct TableAssembler<E: TextEngine> {
    recognizer: CellRecognizer<E>,
}

impl<E: TextEngine> TableAssembler<E> {
    pub fn new(recognizer: CellRecognizer<E>) -> Self {
        Self { recognizer }
    }

    /// The cell recognizer in use.
    pub fn recognizer(&self) -> &CellRecognizer<E> {
        &self.recognizer
    }

    /// Recognize every cell of `lattice`.
    ///
    /// Rows whose cells are all blank are dropped and the remaining rows are
    /// padded with empty strings to the longest row. Returns `None` when no
    /// row survives. OCR failures abort the whole table.
    pub fn assemble(&self, page: &DynamicImage, lattice: &Lattice) -> Result<Option<RawTable>> {
        let mut table: RawTable = Vec::new();

        for (index, cells) in lattice.rows().into_iter().enumerate() {
            let mut row = Vec::with_capacity(cells.len());
            for cell in cells {
                row.push(self.recognizer.recognize(page, cell)?);
            }

            if row.iter().all(|text| text.trim().is_empty()) {
                trace!("Dropping blank lattice row {}", index);
                continue;
            }
            table.push(row);
        }

        if table.is_empty() {
            debug!("No cell text recognized");
            return Ok(None);
        }

        let width = table.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut table {
            row.resize(width, String::new());
        }

        debug!("Assembled {}x{} table", table.len(), width);
        Ok(Some(table))
    }
}
