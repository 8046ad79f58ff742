//! Positioned span extraction.
//!
//! [`SpanSource`] is the seam to the layout backend. [`LopdfSource`] walks
//! each page content stream with lopdf and records every shown string with
//! its font, effective size, fill color, baseline origin and text-object
//! block. Origins are flipped so `y` grows downward from the page top.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, warn};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::model::{Point, Span};

const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);
/// TJ adjustments beyond this (thousandths of an em) read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    /// 1-based page number.
    pub number: usize,
    pub width: f32,
    pub height: f32,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub name: String,
    pub pages: Vec<SourcePage>,
}

impl SourceDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, number: usize) -> Option<&SourcePage> {
        self.pages.iter().find(|p| p.number == number)
    }
}

/// Layout backend yielding per-page spans in reading order.
pub trait SpanSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<SourceDocument>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfSource;

impl SpanSource for LopdfSource {
    fn load(&self, path: &Path) -> Result<SourceDocument> {
        let name = document_name(path);
        let doc = Document::load(path).map_err(|e| Error::Extraction {
            document: name.clone(),
            reason: e.to_string(),
        })?;

        let mut pages = Vec::new();
        for (page_index, (_, &page_id)) in doc.get_pages().iter().enumerate() {
            let current_page = page_index + 1;
            let (width, height) = page_size(&doc, page_id);
            let fonts = page_fonts(&doc, page_id);

            let spans = match doc
                .get_page_content(page_id)
                .and_then(|data| Content::decode(&data))
            {
                Ok(content) => extract_spans(&content.operations, &fonts, current_page, height),
                Err(e) => {
                    warn!("{}: could not read page {}: {}", name, current_page, e);
                    Vec::new()
                }
            };
            debug!("{}: page {} yielded {} spans", name, current_page, spans.len());

            pages.push(SourcePage {
                number: current_page,
                width,
                height,
                spans,
            });
        }

        if pages.is_empty() {
            return Err(Error::Extraction {
                document: name,
                reason: "document has no pages".to_string(),
            });
        }

        Ok(SourceDocument { name, pages })
    }
}

pub fn document_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string()
}

/// Walk content operations and collect spans for one page.
pub fn extract_spans(
    operations: &[Operation],
    fonts: &HashMap<Vec<u8>, String>,
    page: usize,
    page_height: f32,
) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut state = TextState::default();
    let mut color_stack: Vec<u32> = Vec::new();
    let mut block_id = 0usize;
    let mut in_text_block = false;

    for op in operations {
        match op.operator.as_str() {
            "q" => color_stack.push(state.color),
            "Q" => {
                if let Some(color) = color_stack.pop() {
                    state.color = color;
                }
            }
            "BT" => {
                if in_text_block {
                    block_id += 1;
                }
                in_text_block = true;
                state.begin_text();
            }
            "ET" => {
                in_text_block = false;
                block_id += 1;
            }
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Object::Name(resource) = &op.operands[0] {
                        state.font = fonts
                            .get(resource)
                            .cloned()
                            .unwrap_or_else(|| String::from_utf8_lossy(resource).to_string());
                    }
                    if let Some(size) = get_number(&op.operands[1]) {
                        state.font_size = size;
                    }
                }
            }
            "TL" => {
                if let Some(leading) = op.operands.first().and_then(get_number) {
                    state.leading = leading;
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = get_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = get_number(&op.operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.translate(tx, ty);
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    let m: Vec<f32> = op.operands.iter().map(|o| get_number(o).unwrap_or(0.0)).collect();
                    state.set_matrix([m[0], m[1], m[2], m[3], m[4], m[5]]);
                }
            }
            "T*" => state.next_line(),
            "rg" | "g" | "k" | "sc" | "scn" => {
                let components: Vec<f32> = op.operands.iter().filter_map(get_number).collect();
                if let Some(color) = pack_color(&components) {
                    state.color = color;
                }
            }
            "Tj" | "TJ" | "'" | "\"" => {
                if !in_text_block {
                    continue;
                }
                if op.operator == "'" || op.operator == "\"" {
                    state.next_line();
                }
                let text = match op.operator.as_str() {
                    "TJ" => decode_tj_array(op.operands.first()),
                    "\"" => decode_string(op.operands.get(2)),
                    _ => decode_string(op.operands.first()),
                };
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let (x, y) = state.position();
                spans.push(
                    Span::new(
                        text,
                        state.font.clone(),
                        state.effective_size(),
                        Point::new(x, page_height - y),
                        block_id,
                        page,
                    )
                    .with_color(state.color),
                );
            }
            _ => {}
        }
    }

    spans
}

#[derive(Debug, Clone)]
struct TextState {
    line_matrix: [f32; 6],
    text_matrix: [f32; 6],
    font: String,
    font_size: f32,
    leading: f32,
    color: u32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            line_matrix: IDENTITY,
            text_matrix: IDENTITY,
            font: String::new(),
            font_size: 12.0,
            leading: 0.0,
            color: 0,
        }
    }
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

impl TextState {
    fn begin_text(&mut self) {
        self.line_matrix = IDENTITY;
        self.text_matrix = IDENTITY;
    }

    fn set_matrix(&mut self, m: [f32; 6]) {
        self.line_matrix = m;
        self.text_matrix = m;
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        let [a, b, c, d, e, f] = self.line_matrix;
        self.line_matrix = [a, b, c, d, tx * a + ty * c + e, tx * b + ty * d + f];
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.translate(0.0, -leading);
    }

    fn position(&self) -> (f32, f32) {
        (self.text_matrix[4], self.text_matrix[5])
    }

    fn effective_size(&self) -> f32 {
        let [_, _, c, d, _, _] = self.text_matrix;
        let scale = (c * c + d * d).sqrt();
        let size = self.font_size * if scale > 0.0 { scale } else { 1.0 };
        (size * 100.0).round() / 100.0
    }
}

/// Pack gray, RGB or CMYK components in 0..=1 into 0xRRGGBB.
fn pack_color(components: &[f32]) -> Option<u32> {
    let (r, g, b) = match components {
        [gray] => (*gray, *gray, *gray),
        [r, g, b] => (*r, *g, *b),
        [c, m, y, k] => ((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k)),
        _ => return None,
    };
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
    Some(channel(r) << 16 | channel(g) << 8 | channel(b))
}

fn decode_string(obj: Option<&Object>) -> String {
    match obj {
        Some(Object::String(bytes, _)) => decode_text_simple(bytes),
        _ => String::new(),
    }
}

fn decode_tj_array(obj: Option<&Object>) -> String {
    let Some(Object::Array(items)) = obj else {
        return String::new();
    };
    let mut combined = String::new();
    for item in items {
        match item {
            Object::String(bytes, _) => combined.push_str(&decode_text_simple(bytes)),
            other => {
                if let Some(adjustment) = get_number(other) {
                    if -adjustment > TJ_SPACE_THRESHOLD && !combined.is_empty() && !combined.ends_with(' ') {
                        combined.push(' ');
                    }
                }
            }
        }
    }
    combined
}

/// Decode a PDF string without font encoding tables:
/// UTF-16BE with BOM, then UTF-8, then Latin-1.
fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look a page attribute up, following `Parent` links for inherited values.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn page_size(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let Some(Object::Array(media_box)) = inherited(doc, page_id, b"MediaBox") else {
        return DEFAULT_PAGE_SIZE;
    };
    let values: Vec<f32> = media_box
        .iter()
        .filter_map(|o| get_number(resolve(doc, o)))
        .collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => ((x1 - x0).abs(), (y1 - y0).abs()),
        _ => DEFAULT_PAGE_SIZE,
    }
}

/// Map font resource names ("F1") to their BaseFont ("Arial,Bold").
fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, String> {
    let mut fonts = HashMap::new();
    let Some(Object::Dictionary(resources)) = inherited(doc, page_id, b"Resources") else {
        return fonts;
    };
    let Some(Object::Dictionary(font_dict)) = resources.get(b"Font").ok().map(|o| resolve(doc, o)) else {
        return fonts;
    };
    for (resource, font) in font_dict.iter() {
        let base_font = match resolve(doc, font) {
            Object::Dictionary(dict) => dict
                .get(b"BaseFont")
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).to_string()),
            _ => None,
        };
        fonts.insert(
            resource.clone(),
            base_font.unwrap_or_else(|| String::from_utf8_lossy(resource).to_string()),
        );
    }
    fonts
}
