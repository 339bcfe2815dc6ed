//! Configuration structures for the table extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::TabgridError;
use crate::grid::GridStrategy;
use crate::ocr::RecognitionMode;

/// Main configuration for the tabgrid pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TabgridConfig {
    /// OCR engine configuration.
    pub ocr: OcrConfig,

    /// Grid detection configuration.
    pub grid: GridConfig,

    /// Per-cell preprocessing configuration.
    pub cell: CellConfig,

    /// Page image configuration.
    pub image: ImageConfig,

    /// PDF ruling-line extraction configuration.
    pub pdf: PdfConfig,

    /// Table validation thresholds.
    pub validation: ValidationConfig,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Path (or bare name on `PATH`) of the tesseract executable.
    pub tesseract_path: PathBuf,

    /// Language models passed to the engine, `+`-separated.
    pub languages: String,

    /// Tesseract OCR engine mode (`--oem`).
    pub engine_mode: u8,

    /// Segmentation mode used for cell crops.
    pub recognition_mode: RecognitionMode,

    /// Extra engine variables, each `name=value`.
    pub variables: Vec<String>,

    /// Model directory for the native ONNX engine.
    pub model_dir: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: PathBuf::from("tesseract"),
            languages: "fra+eng".to_string(),
            engine_mode: 3,
            recognition_mode: RecognitionMode::SingleLine,
            variables: vec!["preserve_interword_spaces=1".to_string()],
            model_dir: None,
        }
    }
}

/// Grid detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Which detection strategy to run.
    pub strategy: GridStrategy,

    /// Length of the line-extraction kernels (`N x 1` and `1 x N`).
    pub line_kernel_length: u32,

    /// Iterations of the line-extraction opening.
    pub morph_iterations: u32,

    /// Iterations of the 3x3 dilation applied to the combined mask.
    pub dilate_iterations: u32,

    /// Axis values closer than this to the previous kept value are merged (pixels).
    pub merge_tolerance: u32,

    /// Cells whose top edges differ by less than this share a row (pixels).
    pub row_tolerance: u32,

    /// Minimum cell bounding-box area, exclusive (pixels).
    pub min_cell_area: u32,

    /// Maximum cell bounding-box area as a fraction of the page, exclusive.
    pub max_cell_area_ratio: f32,

    /// Apply a light Gaussian blur before binarizing.
    pub blur: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            strategy: GridStrategy::Intersections,
            line_kernel_length: 40,
            morph_iterations: 2,
            dilate_iterations: 2,
            merge_tolerance: 10,
            row_tolerance: 10,
            min_cell_area: 500,
            max_cell_area_ratio: 0.9,
            blur: true,
        }
    }
}

/// Per-cell preprocessing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    /// Pixels trimmed from every side of a cell before recognition.
    pub margin: u32,

    /// CLAHE clip limit.
    pub clahe_clip_limit: f32,

    /// CLAHE tile grid size (tiles per axis).
    pub clahe_tiles: u32,

    /// Median filter radius used for denoising (0 disables).
    pub denoise_radius: u32,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            margin: 5,
            clahe_clip_limit: 3.0,
            clahe_tiles: 8,
            denoise_radius: 1,
        }
    }
}

/// Page image configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Pages narrower than this are upscaled before grid detection (0 disables).
    pub min_width: u32,

    /// Width narrow pages are upscaled to.
    pub target_width: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            min_width: 2000,
            target_width: 2500,
        }
    }
}

/// PDF ruling-line extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Edges within this distance of an intersection still meet it (points).
    pub intersection_tolerance: f32,

    /// Parallel edges closer than this are snapped onto one line (points).
    pub snap_tolerance: f32,

    /// Edges shorter than this are ignored (points).
    pub min_edge_length: f32,

    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            intersection_tolerance: 3.0,
            snap_tolerance: 3.0,
            min_edge_length: 3.0,
            max_pages: 0,
        }
    }
}

/// Heuristic thresholds for accepting an extracted cell matrix as a table.
///
/// The defaults have not been calibrated against a labeled corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum number of rows.
    pub min_rows: usize,

    /// Minimum mean number of columns per row.
    pub min_mean_columns: f64,

    /// Column-count variance may not exceed `max_variance_ratio * mean`.
    pub max_variance_ratio: f64,

    /// Maximum fraction of empty or whitespace-only cells.
    pub max_empty_ratio: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_mean_columns: 2.0,
            max_variance_ratio: 1.0,
            max_empty_ratio: 0.7,
        }
    }
}

impl TabgridConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| TabgridError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> crate::error::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| TabgridError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: TabgridConfig =
            serde_json::from_str(r#"{"validation": {"max_empty_ratio": 0.5}}"#).unwrap();

        assert_eq!(config.validation.max_empty_ratio, 0.5);
        assert_eq!(config.validation.min_rows, 2);
        assert_eq!(config.grid.merge_tolerance, 10);
        assert_eq!(config.ocr.languages, "fra+eng");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = TabgridConfig::default();
        config.grid.strategy = GridStrategy::Contours;
        config.save(&path).unwrap();

        let loaded = TabgridConfig::from_file(&path).unwrap();
        assert_eq!(loaded.grid.strategy, GridStrategy::Contours);
        assert_eq!(loaded.ocr.recognition_mode, RecognitionMode::SingleLine);
    }

    #[test]
    fn test_malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"grid": {"strategy": "diagonal"}}"#).unwrap();

        let result = TabgridConfig::from_file(&path);
        assert!(matches!(result, Err(TabgridError::Config(_))));

        let missing = TabgridConfig::from_file(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(TabgridError::Io(_))));
    }
}
