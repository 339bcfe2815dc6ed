//! Contour strategy: cells as enclosed regions between ruling lines.

use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use tracing::{debug, trace};

use super::CellRect;
use super::lines::{LineMasks, thicken};
use crate::models::config::GridConfig;

/// Find cell rectangles of a page grouped into rows.
///
/// Rows are ordered top to bottom and each row left to right. Returns `None`
/// when no plausible cell is found.
pub fn detect_cells(gray: &GrayImage, config: &GridConfig) -> Option<Vec<Vec<CellRect>>> {
    let masks = LineMasks::extract(gray, config, false);
    let mut interiors = thicken(&masks.grid(), config.dilate_iterations);
    image::imageops::invert(&mut interiors);

    let page_area = gray.width() as f64 * gray.height() as f64;
    let max_area = page_area * config.max_cell_area_ratio as f64;
    let min_area = config.min_cell_area as f64;

    let cells: Vec<CellRect> = find_contours::<u32>(&interiors)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .filter_map(|contour| {
            let xs = contour.points.iter().map(|p| p.x);
            let ys = contour.points.iter().map(|p| p.y);
            let (min_x, max_x) = (xs.clone().min()?, xs.max()?);
            let (min_y, max_y) = (ys.clone().min()?, ys.max()?);
            Some(CellRect::new(
                min_x,
                min_y,
                max_x - min_x + 1,
                max_y - min_y + 1,
            ))
        })
        .filter(|rect| {
            let area = rect.area() as f64;
            let keep = area > min_area && area < max_area;
            if !keep {
                trace!("Rejected region {:?} (area {})", rect, area);
            }
            keep
        })
        .collect();

    if cells.is_empty() {
        debug!("No cell contours found");
        return None;
    }

    let rows = group_rows(cells, config.row_tolerance);
    debug!(
        "Grouped {} cells into {} rows",
        rows.iter().map(Vec::len).sum::<usize>(),
        rows.len()
    );
    Some(rows)
}

/// Group cells into rows by the proximity of their top edges.
///
/// Cells are visited by `(y, x)`; a cell joins the current row while its top is
/// within `tolerance` of the row's first cell.
pub fn group_rows(mut cells: Vec<CellRect>, tolerance: u32) -> Vec<Vec<CellRect>> {
    cells.sort_by_key(|c| (c.y, c.x));

    let mut rows: Vec<Vec<CellRect>> = Vec::new();
    let mut current: Vec<CellRect> = Vec::new();

    for cell in cells {
        match current.first() {
            Some(first) if cell.y.abs_diff(first.y) >= tolerance => {
                current.sort_by_key(|c| c.x);
                rows.push(std::mem::take(&mut current));
                current.push(cell);
            }
            _ => current.push(cell),
        }
    }

    if !current.is_empty() {
        current.sort_by_key(|c| c.x);
        rows.push(current);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::testing::ruled_page;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_group_rows() {
        let cells = vec![
            CellRect::new(100, 52, 90, 40),
            CellRect::new(0, 50, 90, 40),
            CellRect::new(0, 0, 90, 40),
            CellRect::new(100, 3, 90, 40),
            CellRect::new(200, 58, 90, 40),
        ];

        let rows = group_rows(cells, 10);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].iter().map(|c| c.x).collect::<Vec<_>>(),
            vec![0, 100]
        );
        assert_eq!(
            rows[1].iter().map(|c| c.x).collect::<Vec<_>>(),
            vec![0, 100, 200]
        );
    }

    #[test]
    fn test_detect_cells_on_ruled_page() {
        let page = ruled_page(400, 300, &[50, 150, 250, 350], &[40, 120, 200]);
        let rows = detect_cells(&page, &GridConfig::default()).unwrap();

        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.len(), 3);
            for pair in row.windows(2) {
                assert!(pair[0].x < pair[1].x);
            }
        }

        // Interiors shrink by the line thickness plus two dilations.
        let first = rows[0][0];
        assert!(first.x > 50 && first.x < 60, "{:?}", first);
        assert!(first.width > 85 && first.width < 100, "{:?}", first);
    }

    #[test]
    fn test_detect_cells_rejects_specks() {
        // Interiors of 19x19 (area 361) are below the minimum area.
        let page = ruled_page(200, 200, &[20, 45, 70], &[20, 45, 70]);
        assert!(detect_cells(&page, &GridConfig::default()).is_none());
    }
}
