//! Tunable thresholds for every pipeline stage.
//!
//! The heuristics disagree between document families, so every number the
//! rules use lives here and can be overridden from a JSON file. Missing keys
//! fall back to the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub merge: MergeConfig,
    pub headings: HeadingRules,
    pub hierarchy: HierarchyConfig,
    pub ranking: RankConfig,
}

impl Config {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Input(format!("cannot read rules {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Input(format!("malformed rules {}: {}", path.display(), e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Maximum baseline difference for fragments on one visual line.
    pub y_tolerance: f32,
    /// Never merge runs across layout blocks. Bullet-font runs are the one
    /// exception: a bullet always joins the run after it on the same page,
    /// even when that run starts a new block.
    pub same_block_only: bool,
    /// Base families whose glyphs are bullets, lowercase.
    pub bullet_fonts: Vec<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            y_tolerance: 1.0,
            same_block_only: true,
            bullet_fonts: vec![
                "symbol".to_string(),
                "zapfdingbats".to_string(),
                "wingdings".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingRules {
    /// Reject any run ending in a period.
    pub strict_period: bool,
    /// Size that makes a run a heading on its own.
    pub large_size: f32,
    pub bold_min_size: f32,
    pub bold_max_words: usize,
    pub colon_max_words: usize,
    pub numbered_max_words: usize,
    /// Headings must start left of this x position.
    pub max_left_margin: Option<f32>,
    /// Largest vertical gap between lines of one wrapped heading.
    pub multiline_gap: f32,
    /// Size difference still treated as the same heading style.
    pub multiline_size_tolerance: f32,
}

impl Default for HeadingRules {
    fn default() -> Self {
        Self {
            strict_period: true,
            large_size: 15.0,
            bold_min_size: 11.0,
            bold_max_words: 12,
            colon_max_words: 10,
            numbered_max_words: 10,
            max_left_margin: Some(200.0),
            multiline_gap: 25.0,
            multiline_size_tolerance: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Headings larger than this always open a new top-level subtree.
    pub top_level_size: f32,
    /// Sizes closer than this compare as equal.
    pub size_epsilon: f32,
    pub exclude_front_matter: bool,
    /// A first page with at most this many headings reads as a cover page.
    pub front_matter_max_headings: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            top_level_size: 15.0,
            size_epsilon: 0.05,
            exclude_front_matter: true,
            front_matter_max_headings: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Lexical,
    Semantic,
    Hybrid,
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lexical" => Ok(Strategy::Lexical),
            "semantic" => Ok(Strategy::Semantic),
            "hybrid" => Ok(Strategy::Hybrid),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    pub strategy: Strategy,
    pub top_n: usize,
    /// Passages shorter than this are not embedded.
    pub min_passage_words: usize,
    /// How many top sections feed sub-section refinement.
    pub refine_sections: usize,
    pub max_subsections: usize,
    pub chunk_sentences: usize,
    pub min_chunk_chars: usize,
    /// Share of the semantic score in the hybrid blend.
    pub semantic_weight: f64,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Lexical,
            top_n: 10,
            min_passage_words: 30,
            refine_sections: 5,
            max_subsections: 20,
            chunk_sentences: 3,
            min_chunk_chars: 50,
            semantic_weight: 0.7,
        }
    }
}
