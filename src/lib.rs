//! Heading outlines and persona-driven section ranking for PDF documents.
//!
//! Positioned spans come out of a [`SpanSource`], get merged into runs,
//! classified into headings, leveled by visual dominance and segmented into
//! sections. Sections are then ranked against a persona and a job to be done.

pub mod classify;
pub mod config;
#[cfg(feature = "candle")]
pub mod embedder;
pub mod error;
pub mod font_utils;
pub mod hierarchy;
pub mod merge;
pub mod model;
pub mod nlp;
pub mod outline;
pub mod pipeline;
pub mod rank;
pub mod segment;
pub mod source;

pub use config::{Config, Strategy};
pub use error::{Error, Result};
pub use model::{Heading, Outline, RankingOutput, Request, Run, Section, Span};
pub use nlp::{EmbeddingModel, GrammaticalAnalyzer, HashingEmbedder, LexicalAnalyzer};
pub use pipeline::{load_request, write_json, DocumentAnalysis, Pipeline};
pub use source::{LopdfSource, SourceDocument, SourcePage, SpanSource};
