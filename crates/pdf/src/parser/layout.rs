//! Content-stream walking.
//!
//! This module turns a page's content-stream operators into positioned
//! primitives: glyph runs, ruling segments and image placements, all in PDF
//! user space (bottom-left origin). The walker tracks the graphics state
//! (`q`/`Q`/`cm`), the text state and the current path, and descends into
//! form XObjects with their own resources and matrix.
//!
//! # Pipeline
//!
//! ```text
//! content ops  ->  PageLayout  ->  words / ruling edges / image boxes
//!   (per page)       walk           see `words` and `table`
//! ```

use log::warn;

use super::backend::{
    decode_text, get_number_from_value, ContentOp, ObjectId, PageId, PdfBackend, PdfValue,
    Resources, XObjectKind,
};
use crate::types::{apply, multiply, Matrix, IDENTITY};
use crate::PdfError;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A run of text shown by a single text operator.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRun {
    pub text: String,
    /// Origin of the first glyph (baseline) in user space.
    pub x: f32,
    pub y: f32,
    /// Horizontal advance of the whole run in user space.
    pub width: f32,
    /// Rendered font size in user space.
    pub font_size: f32,
    pub font_name: String,
}

/// A straight painted path segment in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// An image XObject drawn on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
    pub name: String,
    pub id: ObjectId,
    /// Bounding box of the transformed unit square: `[x0, y0, x1, y1]`.
    pub bbox: [f32; 4],
}

/// Everything the walker found on one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub glyphs: Vec<GlyphRun>,
    pub segments: Vec<Segment>,
    pub images: Vec<ImagePlacement>,
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Approximate glyph advance as a fraction of the font size. Glyph width
/// tables are not consulted.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Kerning beyond this fraction of an average glyph advance reads as a space.
const KERNING_SPACE_RATIO: f32 = 0.3;

/// Nested form XObjects deeper than this are ignored.
const MAX_FORM_DEPTH: usize = 8;

// ---------------------------------------------------------------------------
// Internal: PDF text-state machine
// ---------------------------------------------------------------------------

/// Text parameters. Saved and restored with the graphics state.
#[derive(Debug, Clone)]
struct TextState {
    /// Current font resource name (the `/F1`-style key, not the full name).
    font_key: Vec<u8>,
    /// Resolved base-font name for the current font.
    font_name: String,
    /// Current font size in text-space units.
    font_size: f32,
    text_matrix: Matrix,
    /// Text line matrix -- set by BT and updated by Td/TD/T*/Tm.
    line_matrix: Matrix,
    /// Horizontal scaling factor (percent / 100).
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_name: String::new(),
            font_size: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    /// Advance the text matrix horizontally by `dx` text-space units.
    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Multiply the text line matrix by a translation (used by Td / TD).
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let new_tx = self.line_matrix[0] * tx + self.line_matrix[2] * ty + self.line_matrix[4];
        let new_ty = self.line_matrix[1] * tx + self.line_matrix[3] * ty + self.line_matrix[5];
        self.line_matrix[4] = new_tx;
        self.line_matrix[5] = new_ty;
        self.text_matrix = self.line_matrix;
    }

    /// Text-space advance for showing `text`.
    fn advance_for(&self, text: &str) -> f32 {
        text.chars()
            .map(|ch| {
                let mut w = self.font_size * APPROX_CHAR_WIDTH_RATIO + self.char_spacing;
                if ch == ' ' {
                    w += self.word_spacing;
                }
                w * self.horiz_scale
            })
            .sum()
    }
}

fn numbers(operands: &[PdfValue]) -> Vec<f32> {
    operands.iter().filter_map(get_number_from_value).collect()
}

fn operand_name(operands: &[PdfValue]) -> Option<&[u8]> {
    match operands.first()? {
        PdfValue::Name(n) => Some(n.as_slice()),
        PdfValue::Str(s) => Some(s.as_slice()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

struct Walker<'a> {
    backend: &'a dyn PdfBackend,
    layout: PageLayout,
    ctm: Matrix,
    text: TextState,
    stack: Vec<(Matrix, TextState)>,
    /// Subpaths of the current path, already in user space.
    path: Vec<Vec<(f32, f32)>>,
}

impl<'a> Walker<'a> {
    fn new(backend: &'a dyn PdfBackend) -> Self {
        Self {
            backend,
            layout: PageLayout::default(),
            ctm: IDENTITY,
            text: TextState::default(),
            stack: Vec::new(),
            path: Vec::new(),
        }
    }

    /// Walk a list of operators.
    ///
    /// | Operator | Action |
    /// |----------|--------|
    /// | `q` `Q` `cm` | Save, restore, concatenate the CTM |
    /// | `BT` `ET` | Begin / end text object |
    /// | `Tf` `Tm` `Td` `TD` `T*` `TL` | Font and text positioning |
    /// | `Tc` `Tw` `Tz` `Ts` | Spacing, scaling, rise |
    /// | `Tj` `TJ` `'` `"` | Show text |
    /// | `m` `l` `c` `v` `y` `h` `re` | Path construction |
    /// | `S` `s` `f` `F` `f*` `B` `B*` `b` `b*` `n` | Path painting |
    /// | `Do` | Draw an image or form XObject |
    fn walk(&mut self, ops: &[ContentOp], resources: &Resources, depth: usize) {
        for op in ops {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                // -- Graphics state -----------------------------------------
                "q" => self.stack.push((self.ctm, self.text.clone())),
                "Q" => {
                    if let Some((ctm, text)) = self.stack.pop() {
                        self.ctm = ctm;
                        self.text = text;
                    }
                }
                "cm" => {
                    let n = numbers(operands);
                    if n.len() == 6 {
                        let m = [n[0], n[1], n[2], n[3], n[4], n[5]];
                        self.ctm = multiply(&m, &self.ctm);
                    }
                }

                // -- Text object delimiters ---------------------------------
                "BT" => {
                    self.text.text_matrix = IDENTITY;
                    self.text.line_matrix = IDENTITY;
                }
                "ET" => {}

                // -- Font and positioning -----------------------------------
                "Tf" => {
                    if let (Some(key), Some(size)) =
                        (operand_name(operands), operands.get(1).and_then(get_number_from_value))
                    {
                        self.text.font_name = resources
                            .font(key)
                            .and_then(|f| f.base_font.clone())
                            .unwrap_or_else(|| String::from_utf8_lossy(key).into_owned());
                        self.text.font_key = key.to_vec();
                        self.text.font_size = size;
                    }
                }
                "Tm" => {
                    let n = numbers(operands);
                    if n.len() == 6 {
                        self.text.text_matrix = [n[0], n[1], n[2], n[3], n[4], n[5]];
                        self.text.line_matrix = self.text.text_matrix;
                    }
                }
                "Td" => {
                    let n = numbers(operands);
                    if n.len() >= 2 {
                        self.text.translate_line(n[0], n[1]);
                    }
                }
                "TD" => {
                    let n = numbers(operands);
                    if n.len() >= 2 {
                        self.text.leading = -n[1];
                        self.text.translate_line(n[0], n[1]);
                    }
                }
                "T*" => {
                    let leading = self.text.leading;
                    self.text.translate_line(0.0, -leading);
                }
                "TL" => {
                    if let Some(v) = operands.first().and_then(get_number_from_value) {
                        self.text.leading = v;
                    }
                }
                "Tc" => {
                    if let Some(v) = operands.first().and_then(get_number_from_value) {
                        self.text.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(v) = operands.first().and_then(get_number_from_value) {
                        self.text.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(v) = operands.first().and_then(get_number_from_value) {
                        self.text.horiz_scale = v / 100.0;
                    }
                }
                "Ts" => {
                    if let Some(v) = operands.first().and_then(get_number_from_value) {
                        self.text.text_rise = v;
                    }
                }

                // -- Show text ----------------------------------------------
                "Tj" => {
                    if let Some(first) = operands.first() {
                        self.show(&[first.clone()], resources);
                    }
                }
                "TJ" => {
                    if let Some(PdfValue::Array(arr)) = operands.first() {
                        self.show(arr, resources);
                    }
                }
                "'" => {
                    let leading = self.text.leading;
                    self.text.translate_line(0.0, -leading);
                    if let Some(first) = operands.first() {
                        self.show(&[first.clone()], resources);
                    }
                }
                "\"" => {
                    if operands.len() >= 3 {
                        if let Some(aw) = get_number_from_value(&operands[0]) {
                            self.text.word_spacing = aw;
                        }
                        if let Some(ac) = get_number_from_value(&operands[1]) {
                            self.text.char_spacing = ac;
                        }
                        let leading = self.text.leading;
                        self.text.translate_line(0.0, -leading);
                        self.show(&[operands[2].clone()], resources);
                    }
                }

                // -- Path construction --------------------------------------
                "m" => {
                    let n = numbers(operands);
                    if n.len() >= 2 {
                        let p = apply(&self.ctm, n[0], n[1]);
                        self.path.push(vec![p]);
                    }
                }
                "l" => {
                    let n = numbers(operands);
                    if n.len() >= 2 {
                        let p = apply(&self.ctm, n[0], n[1]);
                        match self.path.last_mut() {
                            Some(subpath) => subpath.push(p),
                            None => self.path.push(vec![p]),
                        }
                    }
                }
                // Curves are never rulings: continue from their end point.
                "c" | "v" | "y" => {
                    let n = numbers(operands);
                    if n.len() >= 2 {
                        let p = apply(&self.ctm, n[n.len() - 2], n[n.len() - 1]);
                        self.path.push(vec![p]);
                    }
                }
                "h" => self.close_subpath(),
                "re" => {
                    let n = numbers(operands);
                    if n.len() >= 4 {
                        let (x, y, w, h) = (n[0], n[1], n[2], n[3]);
                        let corners = [(x, y), (x + w, y), (x + w, y + h), (x, y + h), (x, y)];
                        self.path.push(
                            corners
                                .iter()
                                .map(|&(px, py)| apply(&self.ctm, px, py))
                                .collect(),
                        );
                    }
                }

                // -- Path painting ------------------------------------------
                "s" | "b" | "b*" => {
                    self.close_subpath();
                    self.paint();
                }
                "S" | "f" | "F" | "f*" | "B" | "B*" => self.paint(),
                "n" => self.path.clear(),

                // -- XObjects -----------------------------------------------
                "Do" => {
                    if let Some(name) = operand_name(operands) {
                        self.draw_xobject(name, resources, depth);
                    }
                }

                _ => {}
            }
        }
    }

    /// Show strings and kerning adjustments as a single glyph run.
    fn show(&mut self, elements: &[PdfValue], resources: &Resources) {
        let font = resources.font(&self.text.font_key);
        let start = self.origin();
        let mut buf = String::new();

        for elem in elements {
            match elem {
                PdfValue::Str(bytes) => {
                    let fragment = decode_text(font, bytes);
                    let advance = self.text.advance_for(&fragment);
                    self.text.advance_x(advance);
                    buf.push_str(&fragment);
                }
                other => {
                    // Negative values move right, in thousandths of a text-space unit.
                    if let Some(adj) = get_number_from_value(other) {
                        let dx = -adj / 1000.0 * self.text.font_size * self.text.horiz_scale;
                        let gap = self.text.font_size
                            * APPROX_CHAR_WIDTH_RATIO
                            * self.text.horiz_scale
                            * KERNING_SPACE_RATIO;
                        if dx > gap && !buf.is_empty() && !buf.ends_with(' ') {
                            buf.push(' ');
                        }
                        self.text.advance_x(dx);
                    }
                }
            }
        }

        if buf.trim().is_empty() {
            return;
        }

        let end = self.origin();
        let m = multiply(&self.text.text_matrix, &self.ctm);
        let font_size = (self.text.font_size * (m[2].powi(2) + m[3].powi(2)).sqrt()).abs();

        self.layout.glyphs.push(GlyphRun {
            text: buf,
            x: start.0,
            y: start.1,
            width: ((end.0 - start.0).powi(2) + (end.1 - start.1).powi(2)).sqrt(),
            font_size,
            font_name: self.text.font_name.clone(),
        });
    }

    /// Current glyph origin (including rise) in user space.
    fn origin(&self) -> (f32, f32) {
        let m = multiply(&self.text.text_matrix, &self.ctm);
        apply(&m, 0.0, self.text.text_rise)
    }

    fn close_subpath(&mut self) {
        if let Some(subpath) = self.path.last_mut() {
            if let Some(&first) = subpath.first() {
                if subpath.last() != Some(&first) {
                    subpath.push(first);
                }
            }
        }
    }

    fn paint(&mut self) {
        for subpath in self.path.drain(..) {
            for pair in subpath.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if a != b {
                    self.layout.segments.push(Segment {
                        x0: a.0,
                        y0: a.1,
                        x1: b.0,
                        y1: b.1,
                    });
                }
            }
        }
    }

    fn draw_xobject(&mut self, name: &[u8], resources: &Resources, depth: usize) {
        let Some(entry) = resources.xobject(name) else {
            return;
        };

        match entry.kind {
            XObjectKind::Image => {
                let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
                    .map(|(x, y)| apply(&self.ctm, x, y));
                let xs = corners.map(|c| c.0);
                let ys = corners.map(|c| c.1);
                self.layout.images.push(ImagePlacement {
                    name: String::from_utf8_lossy(name).into_owned(),
                    id: entry.id,
                    bbox: [
                        xs.iter().copied().fold(f32::INFINITY, f32::min),
                        ys.iter().copied().fold(f32::INFINITY, f32::min),
                        xs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
                        ys.iter().copied().fold(f32::NEG_INFINITY, f32::max),
                    ],
                });
            }
            XObjectKind::Form => {
                if depth >= MAX_FORM_DEPTH {
                    warn!("Form XObject nesting too deep, skipping {:?}", entry.id);
                    return;
                }
                let form = match self.backend.form_xobject(entry.id) {
                    Ok(form) => form,
                    Err(e) => {
                        warn!("Skipping form XObject {:?}: {}", entry.id, e);
                        return;
                    }
                };
                let ops = match self.backend.decode_content(&form.content) {
                    Ok(ops) => ops,
                    Err(e) => {
                        warn!("Skipping form XObject {:?}: {}", entry.id, e);
                        return;
                    }
                };

                self.stack.push((self.ctm, self.text.clone()));
                let saved_path = std::mem::take(&mut self.path);
                self.ctm = multiply(&form.matrix, &self.ctm);
                self.walk(&ops, form.resources.as_ref().unwrap_or(resources), depth + 1);
                self.path = saved_path;
                if let Some((ctm, text)) = self.stack.pop() {
                    self.ctm = ctm;
                    self.text = text;
                }
            }
            XObjectKind::Other => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Walk a single page's content stream.
pub fn extract_page_layout(
    backend: &dyn PdfBackend,
    page_id: PageId,
) -> Result<PageLayout, PdfError> {
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;
    let resources = backend.page_resources(page_id);

    let mut walker = Walker::new(backend);
    walker.walk(&ops, &resources, 0);
    Ok(walker.layout)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
