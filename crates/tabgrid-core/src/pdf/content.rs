//! Page content stream interpretation: ruling edges and positioned text.
//!
//! Only the operators that draw straight lines, rectangles or text are
//! followed. Coordinates are reported top-down: `top = -y` in device space,
//! so larger values are further down the page.

use std::collections::HashSet;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object};
use tracing::{trace, warn};

use super::lattice::Edge;
use crate::error::PdfError;

/// Nested form XObjects deeper than this are ignored.
const MAX_FORM_DEPTH: usize = 8;

/// Segments shorter than this across their main axis count as axis-aligned.
const AXIS_EPSILON: f32 = 0.5;

/// Glyph advance assumed for every character, in ems.
const GLYPH_ADVANCE: f32 = 0.5;

/// TJ adjustments below this (thousandths of an em) read as a word gap.
const WORD_GAP: f32 = -200.0;

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix([f32; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self` applied first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let mut values = [0.0; 6];
        for (slot, operand) in values.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        Some(Matrix(values))
    }
}

/// A piece of text drawn at one position, in top-down coordinates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextRun {
    pub x0: f32,
    pub x1: f32,
    pub top: f32,
    pub bottom: f32,
    pub text: String,
}

impl TextRun {
    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.top + self.bottom) / 2.0)
    }
}

/// Everything collected from one page.
#[derive(Debug, Default)]
pub(crate) struct PageGraphics {
    pub edges: Vec<Edge>,
    pub runs: Vec<TextRun>,
}

/// Interpret the content stream of a page.
pub(crate) fn page_graphics(
    doc: &Document,
    page: u32,
    page_id: lopdf::ObjectId,
    resources: Option<&Dictionary>,
) -> Result<PageGraphics, PdfError> {
    let data = doc
        .get_page_content(page_id)
        .map_err(|e| PdfError::ContentStream {
            page,
            reason: e.to_string(),
        })?;

    let mut interpreter = Interpreter::new(doc);
    interpreter.run(&data, Matrix::IDENTITY, resources, 0).map_err(|reason| {
        PdfError::ContentStream { page, reason }
    })?;

    trace!(
        "Page {}: {} edges, {} text runs",
        page,
        interpreter.graphics.edges.len(),
        interpreter.graphics.runs.len()
    );
    Ok(interpreter.graphics)
}

#[derive(Debug, Clone, Copy)]
struct TextState {
    size: f32,
    leading: f32,
    rise: f32,
    matrix: Matrix,
    line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            size: 0.0,
            leading: 0.0,
            rise: 0.0,
            matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
        }
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    graphics: PageGraphics,
    /// Composite fonts already reported.
    composite_fonts: HashSet<Vec<u8>>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            graphics: PageGraphics::default(),
            composite_fonts: HashSet::new(),
        }
    }

    fn run(
        &mut self,
        data: &[u8],
        base: Matrix,
        resources: Option<&Dictionary>,
        depth: usize,
    ) -> Result<(), String> {
        let content = Content::decode(data).map_err(|e| e.to_string())?;

        let mut ctm = base;
        let mut stack: Vec<(Matrix, TextState)> = Vec::new();
        let mut text = TextState::default();

        let mut segments: Vec<((f32, f32), (f32, f32))> = Vec::new();
        let mut current: Option<(f32, f32)> = None;
        let mut start: Option<(f32, f32)> = None;

        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => stack.push((ctm, text)),
                "Q" => {
                    if let Some((saved_ctm, saved_text)) = stack.pop() {
                        ctm = saved_ctm;
                        text = saved_text;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        ctm = m.then(&ctm);
                    }
                }

                // Path construction, in user space.
                "m" => {
                    if let Some((x, y)) = point(operands, 0) {
                        current = Some((x, y));
                        start = Some((x, y));
                    }
                }
                "l" => {
                    if let (Some(from), Some(to)) = (current, point(operands, 0)) {
                        segments.push((ctm.apply(from.0, from.1), ctm.apply(to.0, to.1)));
                        current = Some(to);
                    }
                }
                "c" => current = point(operands, 4).or(current),
                "v" | "y" => current = point(operands, 2).or(current),
                "h" => {
                    if let (Some(from), Some(to)) = (current, start) {
                        segments.push((ctm.apply(from.0, from.1), ctm.apply(to.0, to.1)));
                        current = Some(to);
                    }
                }
                "re" => {
                    if let (Some((x, y)), Some((w, h))) = (point(operands, 0), point(operands, 2)) {
                        let corners = [(x, y), (x + w, y), (x + w, y + h), (x, y + h)];
                        for i in 0..4 {
                            let (p, q) = (corners[i], corners[(i + 1) % 4]);
                            segments.push((ctm.apply(p.0, p.1), ctm.apply(q.0, q.1)));
                        }
                        current = Some((x, y));
                        start = Some((x, y));
                    }
                }

                // Painting.
                "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    for (p, q) in segments.drain(..) {
                        if let Some(edge) = axis_edge(p, q) {
                            self.graphics.edges.push(edge);
                        }
                    }
                    current = None;
                    start = None;
                }
                "n" => {
                    segments.clear();
                    current = None;
                    start = None;
                }

                // Text state.
                "BT" => {
                    text.matrix = Matrix::IDENTITY;
                    text.line_matrix = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(Ok(name)) = operands.first().map(|o| o.as_name()) {
                        self.check_font(name, resources);
                    }
                    if let Some(size) = operands.get(1).and_then(number) {
                        text.size = size;
                    }
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(number) {
                        text.leading = leading;
                    }
                }
                "Ts" => {
                    if let Some(rise) = operands.first().and_then(number) {
                        text.rise = rise;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        text.matrix = m;
                        text.line_matrix = m;
                    }
                }
                "Td" => {
                    if let Some((tx, ty)) = point(operands, 0) {
                        next_line(&mut text, tx, ty);
                    }
                }
                "TD" => {
                    if let Some((tx, ty)) = point(operands, 0) {
                        text.leading = -ty;
                        next_line(&mut text, tx, ty);
                    }
                }
                "T*" => {
                    let leading = text.leading;
                    next_line(&mut text, 0.0, -leading);
                }

                // Text showing.
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&mut text, &ctm, &decode_text(bytes), 0.0);
                    }
                }
                "'" => {
                    let leading = text.leading;
                    next_line(&mut text, 0.0, -leading);
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&mut text, &ctm, &decode_text(bytes), 0.0);
                    }
                }
                "\"" => {
                    let leading = text.leading;
                    next_line(&mut text, 0.0, -leading);
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(&mut text, &ctm, &decode_text(bytes), 0.0);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let (string, adjust) = collapse_tj(items);
                        self.show(&mut text, &ctm, &string, adjust);
                    }
                }

                "Do" => {
                    if depth >= MAX_FORM_DEPTH {
                        warn!("Form XObjects nested deeper than {}", MAX_FORM_DEPTH);
                        continue;
                    }
                    let Some(name) = operands.first().and_then(|o| o.as_name().ok()) else {
                        continue;
                    };
                    self.draw_form(name, resources, &ctm, depth)?;
                }

                _ => {}
            }
        }

        Ok(())
    }

    /// Record a shown string and advance the text matrix past it.
    ///
    /// `adjust` is the total TJ displacement in thousandths of an em.
    fn show(&mut self, text: &mut TextState, ctm: &Matrix, string: &str, adjust: f32) {
        let glyphs = string.chars().count() as f32;
        let advance = glyphs * GLYPH_ADVANCE * text.size - adjust / 1000.0 * text.size;

        let to_device = text.matrix.then(ctm);
        let (x0, y0) = to_device.apply(0.0, text.rise - 0.2 * text.size);
        let (x1, y1) = to_device.apply(advance.max(0.0), text.rise + 0.8 * text.size);

        if !string.trim().is_empty() {
            self.graphics.runs.push(TextRun {
                x0: x0.min(x1),
                x1: x0.max(x1),
                top: -y0.max(y1),
                bottom: -y0.min(y1),
                text: string.to_string(),
            });
        }

        text.matrix = Matrix::translate(advance, 0.0).then(&text.matrix);
    }

    /// Report composite fonts once: their CID codes are not mapped to text.
    fn check_font(&mut self, name: &[u8], resources: Option<&Dictionary>) {
        if self.composite_fonts.contains(name) || !is_composite_font(self.doc, resources, name) {
            return;
        }
        warn!(
            "Font {} is a composite (Type0) font; its cell text may be garbled",
            String::from_utf8_lossy(name)
        );
        self.composite_fonts.insert(name.to_vec());
    }

    fn draw_form(
        &mut self,
        name: &[u8],
        resources: Option<&Dictionary>,
        ctm: &Matrix,
        depth: usize,
    ) -> Result<(), String> {
        let doc = self.doc;
        let Some(xobjects) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, o)| o.as_dict().ok())
        else {
            return Ok(());
        };

        let Ok((_, Object::Stream(stream))) = xobjects
            .get(name)
            .and_then(|reference| doc.dereference(reference))
        else {
            return Ok(());
        };

        let is_form = stream
            .dict
            .get(b"Subtype")
            .and_then(|o| o.as_name())
            .map(|subtype| subtype == b"Form")
            .unwrap_or(false);
        if !is_form {
            return Ok(());
        }

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| o.as_array().ok())
            .and_then(|values| Matrix::from_operands(values))
            .unwrap_or(Matrix::IDENTITY);

        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, o)| o.as_dict().ok())
            .or(resources);

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        trace!("Entering form XObject {}", String::from_utf8_lossy(name));
        self.run(&data, matrix.then(ctm), form_resources, depth + 1)
    }
}

/// Whether resource font `name` is a Type0 (CID-keyed) font.
fn is_composite_font(doc: &Document, resources: Option<&Dictionary>, name: &[u8]) -> bool {
    resources
        .and_then(|r| r.get(b"Font").ok())
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, o)| o.as_dict().ok())
        .and_then(|fonts| fonts.get(name).ok())
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, o)| o.as_dict().ok())
        .and_then(|font| font.get(b"Subtype").ok())
        .and_then(|o| o.as_name().ok())
        .map(|subtype| subtype == b"Type0")
        .unwrap_or(false)
}

fn next_line(text: &mut TextState, tx: f32, ty: f32) {
    text.line_matrix = Matrix::translate(tx, ty).then(&text.line_matrix);
    text.matrix = text.line_matrix;
}

/// Numeric operand as `f32`.
fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn point(operands: &[Object], offset: usize) -> Option<(f32, f32)> {
    Some((
        number(operands.get(offset)?)?,
        number(operands.get(offset + 1)?)?,
    ))
}

/// Device-space segment as a top-down edge, if it is axis-aligned.
fn axis_edge(p: (f32, f32), q: (f32, f32)) -> Option<Edge> {
    let (dx, dy) = ((q.0 - p.0).abs(), (q.1 - p.1).abs());
    if dy <= AXIS_EPSILON && dx > dy {
        let top = -(p.1 + q.1) / 2.0;
        Some(Edge::horizontal(top, p.0.min(q.0), p.0.max(q.0)))
    } else if dx <= AXIS_EPSILON && dy > dx {
        let x = (p.0 + q.0) / 2.0;
        Some(Edge::vertical(x, -p.1.max(q.1), -p.1.min(q.1)))
    } else {
        None
    }
}

/// Join the strings of a TJ array, turning wide negative kerns into spaces.
///
/// Returns the text and the summed numeric adjustments.
fn collapse_tj(items: &[Object]) -> (String, f32) {
    let mut text = String::new();
    let mut adjust = 0.0;

    for item in items {
        match item {
            Object::String(bytes, _) => text.push_str(&decode_text(bytes)),
            other => {
                if let Some(value) = number(other) {
                    adjust += value;
                    if value < WORD_GAP && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
            }
        }
    }

    (text, adjust)
}

/// Decode a PDF string operand.
///
/// UTF-16BE with a byte order mark, or with every high byte zero, is read as
/// UTF-16; anything else is read as Latin-1.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return utf16_be(rest);
    }

    let interleaved = bytes.len() >= 2
        && bytes.len() % 2 == 0
        && bytes.iter().step_by(2).all(|&b| b == 0)
        && bytes.iter().skip(1).step_by(2).all(|&b| b != 0);
    if interleaved {
        return utf16_be(bytes);
    }

    bytes.iter().map(|&b| b as char).collect()
}

fn utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
