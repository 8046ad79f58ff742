//! Records flowing through the pipeline and the JSON shapes it reads and writes.

use serde::{Deserialize, Serialize};

use crate::font_utils::FontStyle;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    /// Baseline position, growing downward from the top of the page.
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A positioned text fragment as emitted by the layout backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub font: String,
    pub size: f32,
    /// Fill color packed as 0xRRGGBB.
    pub color: u32,
    pub origin: Point,
    pub block_id: usize,
    /// 1-based page number.
    pub page: usize,
    pub style: FontStyle,
}

impl Span {
    pub fn new(
        text: impl Into<String>,
        font: impl Into<String>,
        size: f32,
        origin: Point,
        block_id: usize,
        page: usize,
    ) -> Self {
        let font = font.into();
        let style = FontStyle::from_font_name(&font);
        Self {
            text: text.into(),
            font,
            size,
            color: 0,
            origin,
            block_id,
            page,
            style,
        }
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn is_bold(&self) -> bool {
        self.style.is_bold()
    }
}

/// A merged span. Same shape as [`Span`]; its text is the space-joined text
/// of every fragment it absorbed.
pub type Run = Span;

/// A heading with its nesting level (1 = top level).
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    pub run: Run,
    pub level: u32,
}

impl Heading {
    pub fn text(&self) -> &str {
        self.run.text.trim()
    }

    pub fn page(&self) -> usize {
        self.run.page
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub document: String,
    pub page_start: usize,
    pub page_end: usize,
    pub title: String,
    pub content: String,
    pub level: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSection {
    pub section: Section,
    pub score: f64,
    pub importance_rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSection {
    pub document: String,
    pub section_title: String,
    pub refined_text: String,
    pub page_number: usize,
}

// Request

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Persona {
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobToBeDone {
    #[serde(default)]
    pub task: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRef {
    pub filename: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// The ranking request: who is reading, what they want, and which documents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub persona: Persona,
    #[serde(default)]
    pub job_to_be_done: JobToBeDone,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
}

// Outline output

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub level: String,
    pub text: String,
    /// 0-based page index.
    pub page: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Outline {
    pub title: String,
    pub outline: Vec<OutlineEntry>,
}

// Ranking output

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Metadata {
    pub input_documents: Vec<String>,
    pub persona: String,
    pub job_to_be_done: String,
    pub processing_timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtractedSection {
    pub document: String,
    pub page_number: usize,
    pub section_title: String,
    pub importance_rank: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RankingOutput {
    pub metadata: Metadata,
    pub extracted_sections: Vec<ExtractedSection>,
    pub sub_section_analysis: Vec<SubSection>,
}

impl From<&RankedSection> for ExtractedSection {
    fn from(ranked: &RankedSection) -> Self {
        Self {
            document: ranked.section.document.clone(),
            page_number: ranked.section.page_start,
            section_title: ranked.section.title.clone(),
            importance_rank: ranked.importance_rank,
        }
    }
}
