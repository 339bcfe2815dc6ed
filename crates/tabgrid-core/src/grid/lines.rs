//! Ruling-line masks: binarization and rectangular morphology.
//!
//! Masks are `GrayImage`s holding 0 (background) or 255 (foreground).

use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{Mask, dilate, grayscale_dilate, grayscale_erode};
use tracing::trace;

use crate::models::config::GridConfig;

/// Sigma matching a 3x3 Gaussian kernel.
const BLUR_SIGMA: f32 = 0.8;

/// Otsu-binarize a grayscale page with dark ink as foreground.
pub fn binarize_inverted(gray: &GrayImage, blur: bool) -> GrayImage {
    let source = if blur {
        gaussian_blur_f32(gray, BLUR_SIGMA)
    } else {
        gray.clone()
    };

    let level = otsu_level(&source);
    trace!("Otsu level: {}", level);

    let mut mask = source;
    for pixel in mask.pixels_mut() {
        pixel[0] = if pixel[0] > level { 0 } else { 255 };
    }
    mask
}

/// Longest kernel side a `Mask` accepts.
const MAX_KERNEL: u32 = 511;

/// Rectangular kernel anchored at `anchor`, as erosion and dilation masks.
///
/// `grayscale_dilate` does not reflect its mask, so the dilation mask is
/// re-anchored at the mirrored position to keep opening anti-extensive for
/// even kernel sides.
fn rect_masks(kernel_width: u32, kernel_height: u32) -> (Mask, Mask) {
    let width = kernel_width.clamp(1, MAX_KERNEL);
    let height = kernel_height.clamp(1, MAX_KERNEL);
    let kernel = GrayImage::from_pixel(width, height, Luma([255]));

    let (ax, ay) = (width / 2, height / 2);
    let erode = Mask::from_image(&kernel, ax as u8, ay as u8);
    let dilate = Mask::from_image(&kernel, (width - 1 - ax) as u8, (height - 1 - ay) as u8);
    (erode, dilate)
}

/// Morphological opening with a `kernel_width x kernel_height` rectangle:
/// `iterations` erosions followed by as many dilations.
///
/// Pixels outside the image never change the result, so erosion does not eat
/// into shapes touching the border.
pub fn open_rect(
    image: &GrayImage,
    kernel_width: u32,
    kernel_height: u32,
    iterations: u32,
) -> GrayImage {
    let (erode_mask, dilate_mask) = rect_masks(kernel_width, kernel_height);

    let mut result = image.clone();
    for _ in 0..iterations {
        result = grayscale_erode(&result, &erode_mask);
    }
    for _ in 0..iterations {
        result = grayscale_dilate(&result, &dilate_mask);
    }
    result
}

/// Dilate repeatedly with a 3x3 square.
pub(crate) fn thicken(image: &GrayImage, iterations: u32) -> GrayImage {
    let mut result = image.clone();
    for _ in 0..iterations {
        result = dilate(&result, Norm::LInf, 1);
    }
    result
}

/// Combine two masks pixel by pixel.
pub(crate) fn combine(a: &GrayImage, b: &GrayImage, f: impl Fn(bool, bool) -> bool) -> GrayImage {
    let mut out = GrayImage::new(a.width(), a.height());
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let on = f(a.get_pixel(x, y)[0] > 0, b.get_pixel(x, y)[0] > 0);
        pixel[0] = if on { 255 } else { 0 };
    }
    out
}

/// Horizontal and vertical ruling lines of a page.
pub struct LineMasks {
    pub horizontal: GrayImage,
    pub vertical: GrayImage,
}

impl LineMasks {
    /// Binarize the page and keep only long horizontal and vertical strokes.
    pub fn extract(gray: &GrayImage, config: &GridConfig, blur: bool) -> Self {
        let binary = binarize_inverted(gray, blur);
        let length = config.line_kernel_length.max(1);

        let horizontal = open_rect(&binary, length, 1, config.morph_iterations);
        let vertical = open_rect(&binary, 1, length, config.morph_iterations);

        Self {
            horizontal,
            vertical,
        }
    }

    /// Pixels on both a horizontal and a vertical line.
    pub fn intersections(&self) -> GrayImage {
        combine(&self.horizontal, &self.vertical, |h, v| h && v)
    }

    /// Pixels on either kind of line.
    pub fn grid(&self) -> GrayImage {
        combine(&self.horizontal, &self.vertical, |h, v| h || v)
    }
}
