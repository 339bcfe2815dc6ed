//! Cell image preprocessing for OCR.

use image::{DynamicImage, GenericImageView, GrayImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::median_filter;
use tracing::trace;

use crate::grid::CellRect;
use crate::models::config::CellConfig;

/// Prepares cell crops for the OCR engine.
pub struct CellPreprocessor {
    /// Pixels trimmed from every side of the cell.
    margin: u32,
    /// CLAHE clip limit.
    clip_limit: f32,
    /// CLAHE tiles per axis.
    tiles: u32,
    /// Median filter radius.
    denoise_radius: u32,
}

impl CellPreprocessor {
    /// Create a preprocessor with default settings.
    pub fn new() -> Self {
        Self::from_config(&CellConfig::default())
    }

    /// Create a preprocessor from configuration.
    pub fn from_config(config: &CellConfig) -> Self {
        Self {
            margin: config.margin,
            clip_limit: config.clahe_clip_limit,
            tiles: config.clahe_tiles.max(1),
            denoise_radius: config.denoise_radius,
        }
    }

    /// Set the margin trimmed from every side.
    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }

    /// Crop the cell, minus the margin, as grayscale.
    ///
    /// Returns `None` when nothing of the cell remains on the page.
    pub fn crop_cell(&self, page: &DynamicImage, cell: CellRect) -> Option<GrayImage> {
        let (width, height) = page.dimensions();
        let rect = cell.inset(self.margin, width, height);

        if rect.area() == 0 {
            trace!("Cell {:?} is empty after margin", cell);
            return None;
        }

        Some(
            page.crop_imm(rect.x, rect.y, rect.width, rect.height)
                .to_luma8(),
        )
    }

    /// Enhance, denoise and binarize a grayscale cell.
    pub fn prepare(&self, gray: &GrayImage) -> GrayImage {
        let enhanced = self.clahe(gray);

        let denoised = if self.denoise_radius > 0 {
            median_filter(&enhanced, self.denoise_radius, self.denoise_radius)
        } else {
            enhanced
        };

        let binary = self.binarize(&denoised);
        self.normalize_polarity(binary)
    }

    /// Otsu threshold: pixels above the level become white.
    pub fn binarize(&self, gray: &GrayImage) -> GrayImage {
        let level = otsu_level(gray);
        let mut binary = gray.clone();
        for pixel in binary.pixels_mut() {
            pixel[0] = if pixel[0] > level { 255 } else { 0 };
        }
        binary
    }

    /// Invert the image when its mean brightness is above the midpoint.
    pub fn normalize_polarity(&self, mut binary: GrayImage) -> GrayImage {
        let count = binary.pixels().len();
        if count == 0 {
            return binary;
        }

        let sum: u64 = binary.pixels().map(|p| p[0] as u64).sum();
        let mean = sum as f64 / count as f64;

        if mean > 127.0 {
            image::imageops::invert(&mut binary);
        }
        binary
    }

    /// Contrast-limited adaptive histogram equalization.
    pub fn clahe(&self, gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return gray.clone();
        }

        let tile_w = width.div_ceil(self.tiles.min(width));
        let tile_h = height.div_ceil(self.tiles.min(height));
        let tiles_x = width.div_ceil(tile_w);
        let tiles_y = height.div_ceil(tile_h);

        let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let x0 = tx * tile_w;
                let y0 = ty * tile_h;
                let x1 = (x0 + tile_w).min(width);
                let y1 = (y0 + tile_h).min(height);
                luts.push(self.tile_lut(gray, x0, y0, x1, y1));
            }
        }

        let mut result = GrayImage::new(width, height);
        for (x, y, pixel) in result.enumerate_pixels_mut() {
            let (tx0, tx1, wx) = neighbours(x, tile_w, tiles_x);
            let (ty0, ty1, wy) = neighbours(y, tile_h, tiles_y);
            let value = gray.get_pixel(x, y)[0] as usize;

            let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][value] as f32;
            let top = lut(tx0, ty0) * (1.0 - wx) + lut(tx1, ty0) * wx;
            let bottom = lut(tx0, ty1) * (1.0 - wx) + lut(tx1, ty1) * wx;

            pixel[0] = (top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8;
        }

        result
    }

    fn tile_lut(&self, gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) -> [u8; 256] {
        let mut hist = [0u32; 256];
        for y in y0..y1 {
            for x in x0..x1 {
                hist[gray.get_pixel(x, y)[0] as usize] += 1;
            }
        }

        let area = (x1 - x0) * (y1 - y0);
        let clip = ((self.clip_limit * area as f32 / 256.0) as u32).max(1);

        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }

        let bonus = excess / 256;
        let residual = excess % 256;
        for bin in hist.iter_mut() {
            *bin += bonus;
        }
        // Spread the remainder evenly over the whole intensity range.
        if residual > 0 {
            let step = (256 / residual).max(1) as usize;
            for bin in hist.iter_mut().step_by(step).take(residual as usize) {
                *bin += 1;
            }
        }

        let scale = 255.0 / area as f32;
        let mut lut = [0u8; 256];
        let mut cumulative = 0u32;
        for (i, bin) in hist.iter().enumerate() {
            cumulative += bin;
            lut[i] = (cumulative as f32 * scale).round().min(255.0) as u8;
        }
        lut
    }
}

impl Default for CellPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Neighbouring tile indices and interpolation weight along one axis.
fn neighbours(pos: u32, tile: u32, tiles: u32) -> (u32, u32, f32) {
    let g = (pos as f32 + 0.5) / tile as f32 - 0.5;
    let lower = g.floor();
    let weight = g - lower;
    let last = (tiles - 1) as f32;

    let t0 = lower.clamp(0.0, last) as u32;
    let t1 = (lower + 1.0).clamp(0.0, last) as u32;
    (t0, t1, weight)
}
