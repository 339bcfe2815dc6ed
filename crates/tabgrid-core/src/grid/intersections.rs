//! Intersection strategy: grid axes from line crossings.

use std::collections::BTreeSet;

use image::GrayImage;
use tracing::debug;

use super::lines::{LineMasks, thicken};
use super::{GridAxes, merge_axis};
use crate::models::config::GridConfig;

/// Find the grid axes of a page from the crossings of its ruling lines.
///
/// Returns `None` when no crossing is found or either axis keeps fewer than
/// two boundaries after merging.
pub fn detect_axes(gray: &GrayImage, config: &GridConfig) -> Option<GridAxes> {
    let masks = LineMasks::extract(gray, config, config.blur);
    let crossings = thicken(&masks.intersections(), config.dilate_iterations);

    let mut xs = BTreeSet::new();
    let mut ys = BTreeSet::new();
    for (x, y, pixel) in crossings.enumerate_pixels() {
        if pixel[0] > 0 {
            xs.insert(x);
            ys.insert(y);
        }
    }

    if xs.is_empty() || ys.is_empty() {
        debug!("No line intersections detected");
        return None;
    }

    let xs = merge_axis(&xs.into_iter().collect::<Vec<_>>(), config.merge_tolerance);
    let ys = merge_axis(&ys.into_iter().collect::<Vec<_>>(), config.merge_tolerance);
    debug!("Grid axes: xs={:?} ys={:?}", xs, ys);

    GridAxes::new(xs, ys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::testing::ruled_page;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_axes_on_ruled_page() {
        let page = ruled_page(400, 300, &[50, 150, 250, 350], &[40, 120, 200]);
        let axes = detect_axes(&page, &GridConfig::default()).unwrap();

        assert_eq!(axes.num_cols(), 3);
        assert_eq!(axes.num_rows(), 2);

        // Each boundary sits at the top-left corner of its thickened crossing.
        for (found, expected) in axes.xs.iter().zip([50, 150, 250, 350]) {
            assert!(found.abs_diff(expected) <= 4, "x {} vs {}", found, expected);
        }
        for (found, expected) in axes.ys.iter().zip([40, 120, 200]) {
            assert!(found.abs_diff(expected) <= 4, "y {} vs {}", found, expected);
        }
    }

    #[test]
    fn test_detect_axes_requires_crossings() {
        // A lone horizontal rule never crosses anything.
        let mut page = GrayImage::from_pixel(300, 100, image::Luma([255]));
        for x in 10..290 {
            page.put_pixel(x, 50, image::Luma([0]));
        }

        assert!(detect_axes(&page, &GridConfig::default()).is_none());
    }

    #[test]
    fn test_single_column_of_crossings_is_not_a_grid() {
        // One vertical line crossing two horizontal lines: a single x boundary.
        let mut page = GrayImage::from_pixel(300, 300, image::Luma([255]));
        for t in 0..2 {
            for x in 20..280 {
                page.put_pixel(x, 50 + t, image::Luma([0]));
                page.put_pixel(x, 250 + t, image::Luma([0]));
            }
            for y in 50..252 {
                page.put_pixel(150 + t, y, image::Luma([0]));
            }
        }
        let mut config = GridConfig::default();
        config.blur = false;

        assert!(detect_axes(&page, &config).is_none());
    }
}
