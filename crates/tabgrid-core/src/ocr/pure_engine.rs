//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.

use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, GrayImage};
use tracing::{debug, info};

use super::{RecognitionMode, TextEngine};
use crate::error::OcrError;

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
///
/// Segmentation modes and language hints are ignored: the detector finds the
/// text regions itself and the recognizer model fixes the alphabet.
pub struct PureOcrEngine {
    engine: pure_onnx_ocr::engine::OcrEngine,
}

impl PureOcrEngine {
    /// Create an engine from model files in a directory.
    ///
    /// The directory must hold `det.onnx`, `latin_rec.onnx` and
    /// `latin_dict.txt`.
    pub fn from_dir(model_dir: &Path) -> Result<Self, OcrError> {
        let det_path = model_dir.join("det.onnx");
        let rec_path = model_dir.join("latin_rec.onnx");
        let dict_path = model_dir.join("latin_dict.txt");

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());

        Ok(Self { engine })
    }
}

impl TextEngine for PureOcrEngine {
    fn recognize_text(
        &self,
        image: &GrayImage,
        _mode: RecognitionMode,
        _languages: &str,
    ) -> Result<String, OcrError> {
        let start = Instant::now();
        let input = DynamicImage::ImageLuma8(image.clone()).to_rgb8();

        let results = self
            .engine
            .run_from_image(&DynamicImage::ImageRgb8(input))
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        // Reading order: coarse line bands, then left to right.
        let mut regions: Vec<(f64, f64, String)> = results
            .iter()
            .map(|r| {
                let (x, y) = top_left(&r.bounding_box);
                (x, y, r.text.replace("[UNK]", " "))
            })
            .collect();
        regions.sort_by(|a, b| {
            let (row_a, row_b) = ((a.1 / 20.0) as i64, (b.1 / 20.0) as i64);
            row_a
                .cmp(&row_b)
                .then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        });

        debug!(
            "pure-onnx-ocr: {} regions in {}ms",
            regions.len(),
            start.elapsed().as_millis()
        );

        Ok(regions
            .into_iter()
            .map(|(_, _, text)| text)
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// Smallest x and y of a region polygon.
fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f64, f64) {
    polygon
        .exterior()
        .coords()
        .fold((f64::MAX, f64::MAX), |(x, y), c| (x.min(c.x), y.min(c.y)))
}
