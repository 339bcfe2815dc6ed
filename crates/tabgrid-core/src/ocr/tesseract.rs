//! Tesseract command-line engine adapter.

use std::io::ErrorKind;
use std::process::Command;

use image::GrayImage;
use tracing::{debug, warn};

use super::{RecognitionMode, TextEngine};
use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// Runs the `tesseract` executable on one cell image per call.
pub struct TesseractEngine {
    config: OcrConfig,
}

impl TesseractEngine {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Arguments following the input image path.
    fn arguments(&self, mode: RecognitionMode, languages: &str) -> Vec<String> {
        let mut args = vec![
            "stdout".to_string(),
            "--oem".to_string(),
            self.config.engine_mode.to_string(),
            "--psm".to_string(),
            mode.psm().to_string(),
            "-l".to_string(),
            languages.to_string(),
        ];
        for variable in &self.config.variables {
            args.push("-c".to_string());
            args.push(variable.clone());
        }
        args
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new(OcrConfig::default())
    }
}

impl TextEngine for TesseractEngine {
    fn recognize_text(
        &self,
        image: &GrayImage,
        mode: RecognitionMode,
        languages: &str,
    ) -> Result<String, OcrError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(OcrError::InvalidImage("empty cell image".to_string()));
        }

        let input = tempfile::Builder::new()
            .prefix("tabgrid-cell-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Preprocessing(format!("temp file: {}", e)))?;
        image
            .save_with_format(input.path(), image::ImageFormat::Png)
            .map_err(|e| OcrError::Preprocessing(format!("failed to write cell: {}", e)))?;

        let output = Command::new(&self.config.tesseract_path)
            .arg(input.path())
            .args(self.arguments(mode, languages))
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => OcrError::EngineUnavailable(format!(
                    "{} not found",
                    self.config.tesseract_path.display()
                )),
                _ => OcrError::EngineUnavailable(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("tesseract exited with {}: {}", output.status, stderr.trim());
            return Err(OcrError::Recognition(stderr.trim().to_string()));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract (psm {}): {:?}", mode.psm(), text.trim());
        Ok(text)
    }
}
