//! Content-stream interpretation: positioned text runs and graphics per page.

use crate::fonts::FontMetrics;
use crate::inputs::{PageInput, ResourceSet, XObjectInput};
use crate::objects::{apply, get_number, matrix_from_operands, multiply, transform_rect, IDENTITY};
use blackletter_core::Rect;
use lopdf::content::Content;
use lopdf::{Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Content stream an operator lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StreamKey {
    /// The page's own (concatenated) content.
    Page(usize),
    Form(ObjectId),
}

/// Address of a glyph range inside a text-showing operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunRef {
    pub stream: StreamKey,
    pub op_index: usize,
    /// Index of the string in a `TJ` array; 0 for the other operators.
    pub element: usize,
    pub byte_start: usize,
    pub byte_end: usize,
}

/// A word as drawn on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub page_index: usize,
    pub reference: RunRef,
    pub bbox: Rect,
    pub text: String,
    /// Font resource name selected when the run was shown.
    pub font: Vec<u8>,
    /// `TJ` adjustment that advances the pen exactly as the run's glyphs did.
    pub removal_offset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphicKind {
    Image,
    InlineImage,
    Path,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicObject {
    pub kind: GraphicKind,
    pub stream: StreamKey,
    pub op_index: usize,
    pub bbox: Rect,
}

#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub page_index: usize,
    pub bounds: Rect,
    pub runs: Vec<TextRun>,
    pub graphics: Vec<GraphicObject>,
    /// Every form drawn on the page, once per `Do`, nested forms included.
    pub form_draws: Vec<ObjectId>,
    /// Font names selected by the page's own content.
    pub page_fonts: BTreeSet<Vec<u8>>,
    /// Font names selected by forms that borrow the page's resources.
    pub borrowed_fonts: BTreeSet<Vec<u8>>,
}

impl PageLayout {
    pub fn has_text(&self) -> bool {
        self.runs.iter().any(|r| !r.text.trim().is_empty())
    }

    /// Page text in content order, one line per baseline change.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut last_y: Option<f32> = None;
        for run in &self.runs {
            if let Some(y) = last_y {
                if (run.bbox.y0 - y).abs() > run.bbox.height().max(1.0) * 0.5 {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            out.push_str(&run.text);
            last_y = Some(run.bbox.y0);
        }
        out
    }

    /// Runs with more than `min_overlap` of their area inside `rect`, in
    /// content order, joined with spaces.
    pub fn text_in(&self, rect: &Rect, min_overlap: f32) -> String {
        self.runs
            .iter()
            .filter(|r| clip(&r.bbox, &self.bounds).overlap_fraction(rect) > min_overlap)
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Part of `bbox` on the page; boxes entirely off the page are kept as-is so
/// they never gain overlap.
pub fn clip(bbox: &Rect, bounds: &Rect) -> Rect {
    bbox.intersection(bounds).unwrap_or(*bbox)
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: [f32; 6],
    font_name: Vec<u8>,
    font: Option<Arc<FontMetrics>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
    line_width: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font_name: Vec::new(),
            font: None,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            line_width: 1.0,
        }
    }
}

/// Run being assembled from consecutive non-blank glyphs.
struct Word {
    byte_start: usize,
    byte_end: usize,
    points: Vec<(f32, f32)>,
    text: String,
    advance: f32,
}

struct Interpreter {
    page_index: usize,
    layout: PageLayout,
    fallback_font: Arc<FontMetrics>,
}

pub(crate) fn interpret(input: &PageInput) -> PageLayout {
    let mut interpreter = Interpreter {
        page_index: input.page_index,
        layout: PageLayout {
            page_index: input.page_index,
            bounds: input.bounds,
            ..Default::default()
        },
        fallback_font: Arc::new(FontMetrics::fallback()),
    };
    interpreter.run_stream(
        StreamKey::Page(input.page_index),
        &input.content,
        &input.resources,
        GraphicsState::default(),
        false,
    );
    interpreter.layout
}

impl Interpreter {
    fn run_stream(
        &mut self,
        stream: StreamKey,
        content: &[u8],
        resources: &ResourceSet,
        initial: GraphicsState,
        borrowed: bool,
    ) {
        let content = match Content::decode(content) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("[Layout] page {} {:?}: undecodable content: {}", self.page_index, stream, e);
                return;
            }
        };

        let mut gs = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = IDENTITY;
        let mut tlm = IDENTITY;
        let mut path: Vec<(f32, f32)> = Vec::new();

        for (op_index, op) in content.operations.iter().enumerate() {
            let operands = &op.operands;
            let num = |i: usize| operands.get(i).and_then(get_number);

            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_from_operands(operands) {
                        gs.ctm = multiply(&m, &gs.ctm);
                    }
                }
                "w" => {
                    if let Some(w) = num(0) {
                        gs.line_width = w;
                    }
                }
                "BT" => {
                    tm = IDENTITY;
                    tlm = IDENTITY;
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        gs.font = resources.fonts.get(name).cloned();
                        gs.font_name = name.clone();
                        if matches!(stream, StreamKey::Page(_)) {
                            self.layout.page_fonts.insert(name.clone());
                        } else if borrowed {
                            self.layout.borrowed_fonts.insert(name.clone());
                        }
                    }
                    if let Some(size) = num(1) {
                        gs.font_size = size;
                    }
                }
                "Tc" => gs.char_spacing = num(0).unwrap_or(gs.char_spacing),
                "Tw" => gs.word_spacing = num(0).unwrap_or(gs.word_spacing),
                "Tz" => gs.h_scale = num(0).map(|v| v / 100.0).unwrap_or(gs.h_scale),
                "TL" => gs.leading = num(0).unwrap_or(gs.leading),
                "Ts" => gs.rise = num(0).unwrap_or(gs.rise),
                "Td" | "TD" => {
                    if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                        if op.operator == "TD" {
                            gs.leading = -ty;
                        }
                        tlm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_from_operands(operands) {
                        tm = m;
                        tlm = m;
                    }
                }
                "T*" => {
                    tlm = multiply(&[1.0, 0.0, 0.0, 1.0, 0.0, -gs.leading], &tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(stream, op_index, 0, bytes, &mut tm, &gs);
                    }
                }
                "'" | "\"" => {
                    let text_operand = if op.operator == "'" { 0 } else { 2 };
                    if op.operator == "\"" {
                        if let (Some(aw), Some(ac)) = (num(0), num(1)) {
                            gs.word_spacing = aw;
                            gs.char_spacing = ac;
                        }
                    }
                    tlm = multiply(&[1.0, 0.0, 0.0, 1.0, 0.0, -gs.leading], &tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = operands.get(text_operand) {
                        self.show(stream, op_index, 0, bytes, &mut tm, &gs);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for (element, item) in items.iter().enumerate() {
                            match item {
                                Object::String(bytes, _) => {
                                    self.show(stream, op_index, element, bytes, &mut tm, &gs)
                                }
                                other => {
                                    if let Some(adjust) = get_number(other) {
                                        let tx = -adjust / 1000.0 * gs.font_size * gs.h_scale;
                                        tm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "m" | "l" => {
                    if let (Some(x), Some(y)) = (num(0), num(1)) {
                        path.push(apply(&gs.ctm, x, y));
                    }
                }
                "c" | "v" | "y" => {
                    let coords: Vec<f32> = operands.iter().filter_map(get_number).collect();
                    for pair in coords.chunks_exact(2) {
                        path.push(apply(&gs.ctm, pair[0], pair[1]));
                    }
                }
                "re" => {
                    if let (Some(x), Some(y), Some(w), Some(h)) = (num(0), num(1), num(2), num(3)) {
                        let rect = transform_rect(&gs.ctm, &Rect::new(x, y, x + w, y + h));
                        path.extend([(rect.x0, rect.y0), (rect.x1, rect.y1)]);
                    }
                }
                "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    if let Some(mut bbox) = Rect::from_points(&path) {
                        if matches!(op.operator.as_str(), "S" | "s" | "B" | "B*" | "b" | "b*") {
                            let scale = (gs.ctm[0] * gs.ctm[3] - gs.ctm[1] * gs.ctm[2]).abs().sqrt();
                            bbox = bbox.inflate(gs.line_width.max(0.0) * scale / 2.0);
                        }
                        self.layout.graphics.push(GraphicObject {
                            kind: GraphicKind::Path,
                            stream,
                            op_index,
                            bbox,
                        });
                    }
                    path.clear();
                }
                "n" => path.clear(),
                "BI" => {
                    self.layout.graphics.push(GraphicObject {
                        kind: GraphicKind::InlineImage,
                        stream,
                        op_index,
                        bbox: transform_rect(&gs.ctm, &Rect::new(0.0, 0.0, 1.0, 1.0)),
                    });
                }
                "Do" => {
                    let Some(Object::Name(name)) = operands.first() else {
                        continue;
                    };
                    match resources.xobjects.get(name) {
                        Some(XObjectInput::Image) => {
                            self.layout.graphics.push(GraphicObject {
                                kind: GraphicKind::Image,
                                stream,
                                op_index,
                                bbox: transform_rect(&gs.ctm, &Rect::new(0.0, 0.0, 1.0, 1.0)),
                            });
                        }
                        Some(XObjectInput::Form(form)) => {
                            self.layout.form_draws.push(form.id);
                            let mut inner = gs.clone();
                            inner.ctm = multiply(&form.matrix, &gs.ctm);
                            let form = Arc::clone(form);
                            self.run_stream(
                                StreamKey::Form(form.id),
                                &form.content,
                                &form.resources,
                                inner,
                                form.inherits_resources,
                            );
                        }
                        None => {}
                    }
                }
                _ => {}
            }
        }
    }

    /// Lays out one shown string, emitting a run per word and advancing `tm`.
    fn show(
        &mut self,
        stream: StreamKey,
        op_index: usize,
        element: usize,
        bytes: &[u8],
        tm: &mut [f32; 6],
        gs: &GraphicsState,
    ) {
        let font = gs.font.clone().unwrap_or_else(|| Arc::clone(&self.fallback_font));
        let size = gs.font_size;
        let scale = [size * gs.h_scale, 0.0, 0.0, size, 0.0, gs.rise];
        let mut word: Option<Word> = None;

        for glyph in font.glyphs(bytes) {
            let w0 = font.width(glyph.code) / 1000.0;
            let spacing = gs.char_spacing
                + if font.is_word_space(glyph.code) {
                    gs.word_spacing
                } else {
                    0.0
                };
            let tx = (w0 * size + spacing) * gs.h_scale;

            if font.is_blank(glyph.code) {
                if let Some(done) = word.take() {
                    self.push_run(stream, op_index, element, done, gs);
                }
            } else {
                let trm = multiply(&scale, &multiply(tm, &gs.ctm));
                let corners = [
                    apply(&trm, 0.0, -0.2),
                    apply(&trm, w0, -0.2),
                    apply(&trm, 0.0, 0.8),
                    apply(&trm, w0, 0.8),
                ];
                let current = word.get_or_insert_with(|| Word {
                    byte_start: glyph.byte_start,
                    byte_end: glyph.byte_end,
                    points: Vec::new(),
                    text: String::new(),
                    advance: 0.0,
                });
                current.byte_end = glyph.byte_end;
                current.points.extend(corners);
                current.text.push_str(&font.decode(glyph.code));
                current.advance += tx;
            }

            *tm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], tm);
        }

        if let Some(done) = word.take() {
            self.push_run(stream, op_index, element, done, gs);
        }
    }

    fn push_run(&mut self, stream: StreamKey, op_index: usize, element: usize, word: Word, gs: &GraphicsState) {
        let Some(bbox) = Rect::from_points(&word.points) else {
            return;
        };
        let denominator = gs.font_size * gs.h_scale;
        let removal_offset = if denominator.abs() > f32::EPSILON {
            -word.advance * 1000.0 / denominator
        } else {
            0.0
        };
        self.layout.runs.push(TextRun {
            page_index: self.page_index,
            reference: RunRef {
                stream,
                op_index,
                element,
                byte_start: word.byte_start,
                byte_end: word.byte_end,
            },
            bbox,
            text: word.text,
            font: gs.font_name.clone(),
            removal_offset,
        });
    }
}
