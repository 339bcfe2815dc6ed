//! Document-level entry point: format dispatch, extraction, conversion.

use std::path::Path;
use std::time::Instant;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::{Result, TabgridError};
use crate::grid::GridDetector;
use crate::models::config::TabgridConfig;
use crate::models::table::{ExtractionResult, SourceTable};
use crate::ocr::{CellRecognizer, TextEngine, create_engine};
use crate::pdf::{LatticePdfExtractor, PdfTableSource};
use crate::table::{TableAssembler, TableValidator, convert};

/// Extensions decoded as page images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

/// Every accepted extension.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "bmp", "tiff", "tif"];

/// Which extraction path a document takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Pdf,
    Image,
}

impl FormatHint {
    /// Hint for a file extension, case-insensitive.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        if extension == "pdf" {
            Some(FormatHint::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Some(FormatHint::Image)
        } else {
            None
        }
    }

    /// Hint for a file path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        Self::from_extension(extension)
            .ok_or_else(|| TabgridError::UnsupportedFormat(format!(".{}", extension)))
    }
}

/// Table extraction pipeline for single documents.
///
/// Owns its configuration and collaborators, so independent instances can
/// run side by side.
pub struct Pipeline {
    config: TabgridConfig,
    engine: Box<dyn TextEngine>,
    pdf: Box<dyn PdfTableSource>,
}

impl Pipeline {
    /// Create a pipeline with the engine selected by `config.ocr`.
    pub fn new(config: TabgridConfig) -> Result<Self> {
        let engine = create_engine(&config.ocr)?;
        Ok(Self::from_parts(config, engine))
    }

    /// Create a pipeline around a specific OCR engine.
    pub fn with_engine(config: TabgridConfig, engine: impl TextEngine + 'static) -> Self {
        Self::from_parts(config, Box::new(engine))
    }

    fn from_parts(config: TabgridConfig, engine: Box<dyn TextEngine>) -> Self {
        let pdf = Box::new(LatticePdfExtractor::new(config.pdf.clone()));
        Self {
            config,
            engine,
            pdf,
        }
    }

    /// Replace the PDF table source.
    pub fn with_pdf_source(mut self, source: impl PdfTableSource + 'static) -> Self {
        self.pdf = Box::new(source);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &TabgridConfig {
        &self.config
    }

    /// Process a file, choosing the path from its extension.
    pub fn process(&self, path: &Path) -> Result<ExtractionResult> {
        let hint = FormatHint::from_path(path)?;
        let data = std::fs::read(path)?;
        info!("Processing {} as {:?}", path.display(), hint);
        self.process_bytes(&data, hint)
    }

    /// Process document bytes.
    pub fn process_bytes(&self, data: &[u8], hint: FormatHint) -> Result<ExtractionResult> {
        let start = Instant::now();

        let result = match hint {
            FormatHint::Pdf => self.process_pdf(data)?,
            FormatHint::Image => {
                let image = image::load_from_memory(data)?;
                self.process_image(&image)?
            }
        };

        info!(
            "Found {} tables in {}ms",
            result.total_tables(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Run grid detection, cell recognition and conversion on a page image.
    pub fn process_image(&self, image: &DynamicImage) -> Result<ExtractionResult> {
        let page = self.upscale(image);

        let detector = GridDetector::new(self.config.grid.clone());
        let Some(lattice) = detector.detect(&page) else {
            return Ok(ExtractionResult::empty());
        };

        let recognizer =
            CellRecognizer::from_config(self.engine.as_ref(), &self.config.ocr, &self.config.cell);
        let assembler = TableAssembler::new(recognizer);

        match assembler.assemble(&page, &lattice)? {
            Some(table) => Ok(convert(&[SourceTable::from_image(table)])),
            None => Ok(ExtractionResult::empty()),
        }
    }

    fn process_pdf(&self, data: &[u8]) -> Result<ExtractionResult> {
        let validator = TableValidator::new(self.config.validation.clone());
        let mut tables = Vec::new();

        for page in self.pdf.extract_tables(data)? {
            let mut index = 0;
            for table in page.tables {
                if validator.is_valid(&table) {
                    index += 1;
                    tables.push(SourceTable::from_page(page.page, index, table));
                }
            }
        }

        debug!("{} valid PDF tables", tables.len());
        Ok(convert(&tables))
    }

    /// Enlarge narrow pages so thin rules survive line extraction.
    fn upscale(&self, image: &DynamicImage) -> DynamicImage {
        let (width, height) = image.dimensions();
        let config = &self.config.image;

        if config.min_width == 0 || width == 0 || width >= config.min_width {
            return image.clone();
        }

        let target_width = config.target_width.max(width);
        let target_height =
            (height as f64 * target_width as f64 / width as f64).round().max(1.0) as u32;
        debug!(
            "Upscaling {}x{} page to {}x{}",
            width, height, target_width, target_height
        );
        image.resize_exact(target_width, target_height, FilterType::CatmullRom)
    }
}
