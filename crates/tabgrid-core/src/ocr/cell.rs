//! Per-cell text recognition.

use image::DynamicImage;
use tracing::trace;

use super::preprocessing::CellPreprocessor;
use super::{RecognitionMode, TextEngine};
use crate::error::OcrError;
use crate::grid::CellRect;
use crate::models::config::{CellConfig, OcrConfig};

/// Recognizes the text inside one cell of a page.
pub struct CellRecognizer<E: TextEngine> {
    engine: E,
    preprocessor: CellPreprocessor,
    mode: RecognitionMode,
    languages: String,
}

impl<E: TextEngine> CellRecognizer<E> {
    /// Create a recognizer with default cell settings and language hint.
    pub fn new(engine: E) -> Self {
        Self::from_config(engine, &OcrConfig::default(), &CellConfig::default())
    }

    /// Create a recognizer from configuration.
    pub fn from_config(engine: E, ocr: &OcrConfig, cell: &CellConfig) -> Self {
        Self {
            engine,
            preprocessor: CellPreprocessor::from_config(cell),
            mode: ocr.recognition_mode,
            languages: ocr.languages.clone(),
        }
    }

    /// Set the default recognition mode.
    pub fn with_mode(mut self, mode: RecognitionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Default recognition mode.
    pub fn mode(&self) -> RecognitionMode {
        self.mode
    }

    /// Recognize a cell with the default mode.
    pub fn recognize(&self, page: &DynamicImage, cell: CellRect) -> Result<String, OcrError> {
        self.recognize_with_mode(page, cell, self.mode)
    }

    /// Recognize a cell with an explicit mode.
    ///
    /// A cell with no pixels left after the margin yields an empty string
    /// without calling the engine.
    pub fn recognize_with_mode(
        &self,
        page: &DynamicImage,
        cell: CellRect,
        mode: RecognitionMode,
    ) -> Result<String, OcrError> {
        let Some(crop) = self.preprocessor.crop_cell(page, cell) else {
            return Ok(String::new());
        };

        let prepared = self.preprocessor.prepare(&crop);
        let text = self
            .engine
            .recognize_text(&prepared, mode, &self.languages)?;

        let text = text.trim().to_string();
        trace!("Cell {:?}: {:?}", cell, text);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::testing::FakeEngine;
    use image::RgbImage;

    #[test]
    fn test_recognize_trims_engine_output() {
        let engine = FakeEngine::new(["  Total \n"]);
        let recognizer = CellRecognizer::new(&engine);
        let page = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            200,
            100,
            image::Rgb([255, 255, 255]),
        ));

        let text = recognizer
            .recognize(&page, CellRect::new(0, 0, 100, 40))
            .unwrap();
        assert_eq!(text, "Total");

        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (90, 30, RecognitionMode::SingleLine, "fra+eng".to_string()));
    }

    #[test]
    fn test_empty_crop_skips_engine() {
        let engine = FakeEngine::new(["should not be used"]);
        let recognizer = CellRecognizer::new(&engine);
        let page = DynamicImage::ImageRgb8(RgbImage::new(50, 50));

        let text = recognizer
            .recognize(&page, CellRect::new(60, 60, 20, 20))
            .unwrap();
        assert_eq!(text, "");
        assert_eq!(engine.call_count(), 0);
    }

    #[test]
    fn test_engine_failure_propagates() {
        let engine = FakeEngine::failing();
        let recognizer = CellRecognizer::new(&engine).with_mode(RecognitionMode::SingleWord);
        let page = DynamicImage::ImageRgb8(RgbImage::new(50, 50));

        let result = recognizer.recognize(&page, CellRect::new(0, 0, 40, 40));
        assert!(matches!(result, Err(OcrError::Recognition(_))));
    }
}
