//! Cell text recognition.
//!
//! The OCR engine itself is a collaborator behind [`TextEngine`]; this module
//! prepares cell crops for it and ships two engine adapters.

mod cell;
mod preprocessing;
#[cfg(feature = "native")]
mod pure_engine;
mod tesseract;

pub use cell::CellRecognizer;
pub use preprocessing::CellPreprocessor;
#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;
pub use tesseract::TesseractEngine;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// Text segmentation assumption handed to the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMode {
    /// Fully automatic page segmentation.
    Auto,
    /// A single uniform block of text.
    SingleBlock,
    /// A single text line.
    #[default]
    SingleLine,
    /// A single word.
    SingleWord,
    /// Sparse text in no particular order.
    SparseText,
}

impl RecognitionMode {
    /// Tesseract page segmentation mode number.
    pub fn psm(self) -> u8 {
        match self {
            RecognitionMode::Auto => 3,
            RecognitionMode::SingleBlock => 6,
            RecognitionMode::SingleLine => 7,
            RecognitionMode::SingleWord => 8,
            RecognitionMode::SparseText => 11,
        }
    }

    /// Mode for a tesseract page segmentation mode number.
    pub fn from_psm(psm: u8) -> Option<Self> {
        match psm {
            3 => Some(RecognitionMode::Auto),
            6 => Some(RecognitionMode::SingleBlock),
            7 => Some(RecognitionMode::SingleLine),
            8 => Some(RecognitionMode::SingleWord),
            11 => Some(RecognitionMode::SparseText),
            _ => None,
        }
    }
}

/// An OCR engine: image region in, recognized string out.
pub trait TextEngine: Send + Sync {
    /// Recognize the text of a prepared cell image.
    ///
    /// `languages` is a `+`-separated list of language models.
    fn recognize_text(
        &self,
        image: &GrayImage,
        mode: RecognitionMode,
        languages: &str,
    ) -> Result<String, OcrError>;
}

impl<T: TextEngine + ?Sized> TextEngine for Box<T> {
    fn recognize_text(
        &self,
        image: &GrayImage,
        mode: RecognitionMode,
        languages: &str,
    ) -> Result<String, OcrError> {
        (**self).recognize_text(image, mode, languages)
    }
}

impl<T: TextEngine + ?Sized> TextEngine for &T {
    fn recognize_text(
        &self,
        image: &GrayImage,
        mode: RecognitionMode,
        languages: &str,
    ) -> Result<String, OcrError> {
        (**self).recognize_text(image, mode, languages)
    }
}

/// Build the engine selected by configuration.
///
/// With the `native` feature and a model directory set, the pure Rust engine
/// is used; otherwise cells go to the tesseract executable.
pub fn create_engine(config: &OcrConfig) -> Result<Box<dyn TextEngine>, OcrError> {
    #[cfg(feature = "native")]
    if let Some(model_dir) = &config.model_dir {
        return Ok(Box::new(PureOcrEngine::from_dir(model_dir)?));
    }

    #[cfg(not(feature = "native"))]
    if config.model_dir.is_some() {
        return Err(OcrError::EngineUnavailable(
            "model_dir requires the `native` feature".to_string(),
        ));
    }

    info!(
        "Using tesseract at {} ({})",
        config.tesseract_path.display(),
        config.languages
    );
    Ok(Box::new(TesseractEngine::new(config.clone())))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Engine returning scripted answers and recording every call.
    pub struct FakeEngine {
        answers: Mutex<Vec<Result<String, OcrError>>>,
        pub calls: Mutex<Vec<(u32, u32, RecognitionMode, String)>>,
    }

    impl FakeEngine {
        /// Answers are handed out in order; once exhausted every call yields "".
        pub fn new<S: Into<String>>(answers: impl IntoIterator<Item = S>) -> Self {
            let mut answers: Vec<Result<String, OcrError>> =
                answers.into_iter().map(|a| Ok(a.into())).collect();
            answers.reverse();
            Self {
                answers: Mutex::new(answers),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Engine whose first call fails.
        pub fn failing() -> Self {
            let engine = Self::new(Vec::<String>::new());
            engine
                .answers
                .lock()
                .unwrap()
                .push(Err(OcrError::Recognition("engine crashed".to_string())));
            engine
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl TextEngine for FakeEngine {
        fn recognize_text(
            &self,
            image: &GrayImage,
            mode: RecognitionMode,
            languages: &str,
        ) -> Result<String, OcrError> {
            self.calls.lock().unwrap().push((
                image.width(),
                image.height(),
                mode,
                languages.to_string(),
            ));
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_single_line() {
        assert_eq!(RecognitionMode::default().psm(), 7);
        assert_eq!(RecognitionMode::from_psm(6), Some(RecognitionMode::SingleBlock));
        assert_eq!(RecognitionMode::from_psm(42), None);
    }
}
