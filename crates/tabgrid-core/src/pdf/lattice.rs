//! Ruling edges to cells to tables.
//!
//! Edges are snapped and joined, crossings become intersection points, each
//! point closes the smallest rectangle bounded by connected edges, and cells
//! sharing a corner form one table.

use std::collections::HashMap;

use tracing::debug;

use super::content::TextRun;
use crate::models::config::PdfConfig;
use crate::models::table::RawTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Orientation {
    Horizontal,
    Vertical,
}

/// An axis-aligned ruling segment, top-down coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Edge {
    pub orientation: Orientation,
    pub x0: f32,
    pub x1: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Edge {
    pub fn horizontal(top: f32, x0: f32, x1: f32) -> Self {
        Self {
            orientation: Orientation::Horizontal,
            x0,
            x1,
            top,
            bottom: top,
        }
    }

    pub fn vertical(x: f32, top: f32, bottom: f32) -> Self {
        Self {
            orientation: Orientation::Vertical,
            x0: x,
            x1: x,
            top,
            bottom,
        }
    }

    fn length(&self) -> f32 {
        match self.orientation {
            Orientation::Horizontal => self.x1 - self.x0,
            Orientation::Vertical => self.bottom - self.top,
        }
    }
}

/// A cell rectangle `(x0, top, x1, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Cell {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
}

impl Cell {
    fn corners(&self) -> [PointKey; 4] {
        [
            key(self.x0, self.top),
            key(self.x1, self.top),
            key(self.x0, self.bottom),
            key(self.x1, self.bottom),
        ]
    }

    fn contains(&self, (x, y): (f32, f32)) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.top && y < self.bottom
    }
}

type PointKey = (u32, u32);

/// Exact-match key of a snapped coordinate pair.
fn key(x: f32, y: f32) -> PointKey {
    // `+ 0.0` folds -0.0 into 0.0.
    ((x + 0.0).to_bits(), (y + 0.0).to_bits())
}

#[derive(Debug, Default)]
struct Crossing {
    horizontal: Vec<usize>,
    vertical: Vec<usize>,
}

/// Builds tables from the edges and text of one page.
pub(crate) struct LatticeBuilder<'a> {
    config: &'a PdfConfig,
}

impl<'a> LatticeBuilder<'a> {
    pub fn new(config: &'a PdfConfig) -> Self {
        Self { config }
    }

    /// Cell matrices of every table on the page, top to bottom.
    pub fn tables(&self, edges: Vec<Edge>, runs: &[TextRun]) -> Vec<RawTable> {
        let edges = self.prepare_edges(edges);
        let (horizontal, vertical): (Vec<Edge>, Vec<Edge>) = edges
            .into_iter()
            .partition(|e| e.orientation == Orientation::Horizontal);

        let cells = self.cells(&horizontal, &vertical);
        let groups = group_cells(cells);
        debug!("{} cell groups on page", groups.len());

        groups
            .into_iter()
            .map(|group| fill_table(&group, runs))
            .collect()
    }

    /// Drop short edges, snap near-collinear edges together, then join
    /// overlapping ones.
    pub fn prepare_edges(&self, edges: Vec<Edge>) -> Vec<Edge> {
        let min_length = self.config.min_edge_length;
        let (mut horizontal, mut vertical): (Vec<Edge>, Vec<Edge>) = edges
            .into_iter()
            .filter(|e| e.length() >= min_length)
            .partition(|e| e.orientation == Orientation::Horizontal);

        let tolerance = self.config.snap_tolerance;
        snap(&mut horizontal, tolerance, |e| e.top, |e, v| {
            e.top = v;
            e.bottom = v;
        });
        snap(&mut vertical, tolerance, |e| e.x0, |e, v| {
            e.x0 = v;
            e.x1 = v;
        });

        let mut joined = join(horizontal, tolerance, |e| e.top, |e| (e.x0, e.x1), |e, end| {
            e.x1 = end
        });
        joined.extend(join(vertical, tolerance, |e| e.x0, |e| (e.top, e.bottom), |e, end| {
            e.bottom = end
        }));
        joined
    }

    /// Smallest closed rectangles between intersection points.
    pub fn cells(&self, horizontal: &[Edge], vertical: &[Edge]) -> Vec<Cell> {
        let tol = self.config.intersection_tolerance;

        let mut crossings: HashMap<PointKey, Crossing> = HashMap::new();
        let mut points: Vec<(f32, f32)> = Vec::new();
        for (vi, v) in vertical.iter().enumerate() {
            for (hi, h) in horizontal.iter().enumerate() {
                let meets = v.top <= h.top + tol
                    && v.bottom >= h.top - tol
                    && v.x0 >= h.x0 - tol
                    && v.x0 <= h.x1 + tol;
                if !meets {
                    continue;
                }
                let entry = crossings.entry(key(v.x0, h.top)).or_insert_with(|| {
                    points.push((v.x0, h.top));
                    Crossing::default()
                });
                entry.horizontal.push(hi);
                entry.vertical.push(vi);
            }
        }

        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        debug!("{} intersections", points.len());

        let connects = |a: (f32, f32), b: (f32, f32)| -> bool {
            let (Some(ca), Some(cb)) = (crossings.get(&key(a.0, a.1)), crossings.get(&key(b.0, b.1)))
            else {
                return false;
            };
            let shared = |xs: &[usize], ys: &[usize]| xs.iter().any(|x| ys.contains(x));
            if a.0 == b.0 {
                shared(&ca.vertical, &cb.vertical)
            } else if a.1 == b.1 {
                shared(&ca.horizontal, &cb.horizontal)
            } else {
                false
            }
        };

        let mut cells = Vec::new();
        for (i, &pt) in points.iter().enumerate() {
            let rest = &points[i + 1..];
            let below = rest.iter().filter(|p| p.0 == pt.0);
            let right: Vec<&(f32, f32)> = rest.iter().filter(|p| p.1 == pt.1).collect();

            'search: for &below_pt in below {
                if !connects(pt, below_pt) {
                    continue;
                }
                for &&right_pt in &right {
                    if !connects(pt, right_pt) {
                        continue;
                    }
                    let corner = (right_pt.0, below_pt.1);
                    if crossings.contains_key(&key(corner.0, corner.1))
                        && connects(corner, right_pt)
                        && connects(corner, below_pt)
                    {
                        cells.push(Cell {
                            x0: pt.0,
                            top: pt.1,
                            x1: corner.0,
                            bottom: corner.1,
                        });
                        break 'search;
                    }
                }
            }
        }

        cells
    }
}

/// Move every object onto the mean of its cluster of nearby values.
fn snap(
    edges: &mut [Edge],
    tolerance: f32,
    value: impl Fn(&Edge) -> f32,
    set: impl Fn(&mut Edge, f32),
) {
    let mut order: Vec<usize> = (0..edges.len()).collect();
    order.sort_by(|&a, &b| value(&edges[a]).total_cmp(&value(&edges[b])));

    let mut cluster: Vec<usize> = Vec::new();
    let flush = |cluster: &mut Vec<usize>, edges: &mut [Edge]| {
        if cluster.is_empty() {
            return;
        }
        let mean =
            cluster.iter().map(|&i| value(&edges[i])).sum::<f32>() / cluster.len() as f32;
        for &i in cluster.iter() {
            set(&mut edges[i], mean);
        }
        cluster.clear();
    };

    let mut last: Option<f32> = None;
    for i in order {
        let v = value(&edges[i]);
        if last.is_some_and(|l| v - l > tolerance) {
            flush(&mut cluster, edges);
        }
        cluster.push(i);
        last = Some(v);
    }
    flush(&mut cluster, edges);
}

/// Merge collinear edges whose spans overlap or nearly touch.
fn join(
    mut edges: Vec<Edge>,
    tolerance: f32,
    line: impl Fn(&Edge) -> f32,
    span: impl Fn(&Edge) -> (f32, f32),
    extend: impl Fn(&mut Edge, f32),
) -> Vec<Edge> {
    edges.sort_by(|a, b| {
        line(a)
            .total_cmp(&line(b))
            .then(span(a).0.total_cmp(&span(b).0))
    });

    let mut joined: Vec<Edge> = Vec::with_capacity(edges.len());
    for edge in edges {
        if let Some(last) = joined.last_mut() {
            let (start, end) = span(&edge);
            if line(last) == line(&edge) && start <= span(last).1 + tolerance {
                if end > span(last).1 {
                    extend(last, end);
                }
                continue;
            }
        }
        joined.push(edge);
    }
    joined
}

/// Partition cells into tables: cells sharing a corner belong together.
/// Groups of a single cell are dropped.
fn group_cells(cells: Vec<Cell>) -> Vec<Vec<Cell>> {
    let mut parent: Vec<usize> = (0..cells.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut owner: HashMap<PointKey, usize> = HashMap::new();
    for (i, cell) in cells.iter().enumerate() {
        for corner in cell.corners() {
            match owner.get(&corner) {
                Some(&j) => {
                    let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                    if a != b {
                        parent[a] = b;
                    }
                }
                None => {
                    owner.insert(corner, i);
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<Cell>> = HashMap::new();
    for (i, cell) in cells.into_iter().enumerate() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(cell);
    }

    let mut tables: Vec<Vec<Cell>> = groups.into_values().filter(|g| g.len() > 1).collect();
    for table in &mut tables {
        table.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.x0.total_cmp(&b.x0)));
    }
    tables.sort_by(|a, b| a[0].top.total_cmp(&b[0].top).then(a[0].x0.total_cmp(&b[0].x0)));
    tables
}

/// Lay a group of cells out as rows and columns and fill in their text.
/// Positions with no cell are left empty.
fn fill_table(cells: &[Cell], runs: &[TextRun]) -> RawTable {
    let mut tops: Vec<f32> = cells.iter().map(|c| c.top).collect();
    let mut lefts: Vec<f32> = cells.iter().map(|c| c.x0).collect();
    for values in [&mut tops, &mut lefts] {
        values.sort_by(f32::total_cmp);
        values.dedup();
    }

    let mut table = vec![vec![String::new(); lefts.len()]; tops.len()];
    for cell in cells {
        let row = tops.iter().position(|&t| t == cell.top);
        let col = lefts.iter().position(|&x| x == cell.x0);
        if let (Some(row), Some(col)) = (row, col) {
            table[row][col] = cell_text(cell, runs);
        }
    }
    table
}

/// Text of the runs centred inside `cell`, line by line.
fn cell_text(cell: &Cell, runs: &[TextRun]) -> String {
    let mut inside: Vec<&TextRun> = runs.iter().filter(|r| cell.contains(r.center())).collect();
    inside.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.x0.total_cmp(&b.x0)));

    let mut lines: Vec<Vec<&TextRun>> = Vec::new();
    let mut line_top: Option<f32> = None;
    for run in inside {
        let same_line =
            line_top.is_some_and(|top| (run.top - top).abs() < (run.bottom - run.top) / 2.0);
        if !same_line {
            lines.push(Vec::new());
            line_top = Some(run.top);
        }
        if let Some(line) = lines.last_mut() {
            line.push(run);
        }
    }

    lines
        .iter_mut()
        .map(|line| {
            line.sort_by(|a, b| a.x0.total_cmp(&b.x0));
            line.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
