//! Table grid detection on page images.
//!
//! Two interchangeable strategies recover the cell lattice of a ruled table:
//! - [`GridStrategy::Intersections`] keeps the points where horizontal and
//!   vertical lines cross and turns them into two sorted axis sequences.
//! - [`GridStrategy::Contours`] traces the enclosed cell interiors and groups
//!   their bounding boxes into rows.
//!
//! Both report "no grid" as `None`.

mod contours;
mod intersections;
mod lines;

pub use contours::detect_cells;
pub use intersections::detect_axes;
pub use lines::{LineMasks, binarize_inverted, open_rect};

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::config::GridConfig;

/// Grid detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GridStrategy {
    /// Line intersections define the axis coordinates.
    #[default]
    Intersections,
    /// Cell interiors are traced as contours.
    Contours,
}

/// A cell rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area in pixels.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Shrink by `margin` on every side, keep at least 1x1, then clamp to a
    /// `page_width x page_height` page. The result may be zero-sized when the
    /// rectangle starts outside the page.
    pub fn inset(&self, margin: u32, page_width: u32, page_height: u32) -> CellRect {
        let x = self.x.saturating_add(margin).min(page_width);
        let y = self.y.saturating_add(margin).min(page_height);
        let width = self.width.saturating_sub(2 * margin).max(1);
        let height = self.height.saturating_sub(2 * margin).max(1);

        CellRect {
            x,
            y,
            width: width.min(page_width - x),
            height: height.min(page_height - y),
        }
    }
}

/// Sorted, merged boundary coordinates along both axes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridAxes {
    /// Column boundaries.
    pub xs: Vec<u32>,
    /// Row boundaries.
    pub ys: Vec<u32>,
}

impl GridAxes {
    /// Build axes, or `None` when either axis has fewer than two boundaries.
    pub fn new(xs: Vec<u32>, ys: Vec<u32>) -> Option<Self> {
        if xs.len() < 2 || ys.len() < 2 {
            return None;
        }
        Some(Self { xs, ys })
    }

    /// Number of lattice rows.
    pub fn num_rows(&self) -> usize {
        self.ys.len() - 1
    }

    /// Number of lattice columns.
    pub fn num_cols(&self) -> usize {
        self.xs.len() - 1
    }

    /// Cell rectangles bounded by consecutive axis pairs, row by row.
    pub fn cells(&self) -> Vec<Vec<CellRect>> {
        self.ys
            .windows(2)
            .map(|ys| {
                self.xs
                    .windows(2)
                    .map(|xs| CellRect::new(xs[0], ys[0], xs[1] - xs[0], ys[1] - ys[0]))
                    .collect()
            })
            .collect()
    }
}

/// The recovered cell lattice of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lattice {
    /// Full grid from axis coordinates.
    Axes(GridAxes),
    /// Pre-grouped rows of cell rectangles, each sorted left to right.
    Rows(Vec<Vec<CellRect>>),
}

impl Lattice {
    /// Rows of cell rectangles, top to bottom.
    pub fn rows(&self) -> Vec<Vec<CellRect>> {
        match self {
            Lattice::Axes(axes) => axes.cells(),
            Lattice::Rows(rows) => rows.clone(),
        }
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        match self {
            Lattice::Axes(axes) => axes.num_rows() * axes.num_cols(),
            Lattice::Rows(rows) => rows.iter().map(Vec::len).sum(),
        }
    }
}

/// Merge sorted values: a value is kept only when it lies more than
/// `tolerance` beyond the last kept value.
pub fn merge_axis(sorted: &[u32], tolerance: u32) -> Vec<u32> {
    let mut merged: Vec<u32> = Vec::with_capacity(sorted.len());
    for &value in sorted {
        match merged.last() {
            Some(&last) if value.saturating_sub(last) <= tolerance => {}
            _ => merged.push(value),
        }
    }
    merged
}

/// Grid detector running the configured strategy.
pub struct GridDetector {
    config: GridConfig,
}

impl GridDetector {
    /// Create a detector.
    pub fn new(config: GridConfig) -> Self {
        Self { config }
    }

    /// Use a different strategy.
    pub fn with_strategy(mut self, strategy: GridStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Active strategy.
    pub fn strategy(&self) -> GridStrategy {
        self.config.strategy
    }

    /// Detect the cell lattice of a page. `None` means no grid was found.
    pub fn detect(&self, image: &DynamicImage) -> Option<Lattice> {
        let (width, height) = image.dimensions();
        info!(
            "Detecting grid on {}x{} page ({:?})",
            width, height, self.config.strategy
        );

        let gray = image.to_luma8();
        let lattice = match self.config.strategy {
            GridStrategy::Intersections => detect_axes(&gray, &self.config).map(Lattice::Axes),
            GridStrategy::Contours => detect_cells(&gray, &self.config).map(Lattice::Rows),
        };

        match &lattice {
            Some(lattice) => debug!("Grid found with {} cells", lattice.cell_count()),
            None => debug!("No grid found"),
        }

        lattice
    }
}

impl Default for GridDetector {
    fn default() -> Self {
        Self::new(GridConfig::default())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use image::{GrayImage, Luma};

    /// White page with black ruling lines, 2px thick, at the given positions.
    pub fn ruled_page(width: u32, height: u32, xs: &[u32], ys: &[u32]) -> GrayImage {
        let mut page = GrayImage::from_pixel(width, height, Luma([255]));
        let (x_min, x_max) = (xs[0], xs[xs.len() - 1]);
        let (y_min, y_max) = (ys[0], ys[ys.len() - 1]);

        for &y in ys {
            for x in x_min..=x_max + 1 {
                for t in 0..2 {
                    page.put_pixel(x, y + t, Luma([0]));
                }
            }
        }
        for &x in xs {
            for y in y_min..=y_max + 1 {
                for t in 0..2 {
                    page.put_pixel(x + t, y, Luma([0]));
                }
            }
        }
        page
    }
}
