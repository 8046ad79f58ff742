//! Relevance ranking of sections against a persona and a job to be done.
//!
//! Lexical scoring counts query keywords in titles and content. Semantic
//! scoring embeds the job and every passage in one batch and uses cosine
//! similarity. Hybrid blends the two. Selection is a stable descending sort,
//! so equal scores keep document order.

use std::cmp::Ordering;
use std::collections::HashSet;

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{RankConfig, Strategy};
use crate::error::{Error, Result};
use crate::model::{RankedSection, Section, SubSection};
use crate::nlp::{cosine_similarity, EmbeddingModel};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").unwrap());
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+\s*(?:day|days|week|weeks|month|months|year|years)\b").unwrap()
});
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());
static BULLETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[•▪●◦‣]|(?:^|\s)[-–](?:\s|$)").unwrap());

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would",
    "could", "should", "may", "might", "can", "this", "that", "these", "those",
];

const BOILERPLATE: &[&str] = &["table of contents", "about", "disclaimer", "copyright"];

const PERSONA_KEYWORD_CAP: usize = 10;
const JOB_KEYWORD_CAP: usize = 15;

/// Keywords pulled from the persona and the job description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryKeywords {
    pub persona: Vec<String>,
    pub job: Vec<String>,
    pub numbers: Vec<String>,
    pub durations: Vec<String>,
}

impl QueryKeywords {
    pub fn extract(persona: &str, job: &str) -> Self {
        Self {
            persona: keywords(persona, PERSONA_KEYWORD_CAP),
            job: keywords(job, JOB_KEYWORD_CAP),
            numbers: NUMBER.find_iter(job).map(|m| m.as_str().to_string()).collect(),
            durations: DURATION
                .find_iter(job)
                .map(|m| m.as_str().to_lowercase())
                .collect(),
        }
    }
}

fn keywords(text: &str, cap: usize) -> Vec<String> {
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let lower = text.to_lowercase();
    WORD.find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| !stop.contains(w))
        .take(cap)
        .map(str::to_string)
        .collect()
}

/// Titles that never carry task-relevant content.
pub fn is_boilerplate_title(title: &str) -> bool {
    let lowered = title.to_lowercase();
    BOILERPLATE.iter().any(|b| lowered.contains(b)) || title.split_whitespace().count() <= 1
}

/// Collapse whitespace and strip bullet glyphs.
pub fn clean_passage(text: &str) -> String {
    let without_bullets = BULLETS.replace_all(text, " ");
    without_bullets.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Weighted keyword hit count, rounded to two decimals.
pub fn lexical_score(section: &Section, keywords: &QueryKeywords) -> f64 {
    let title = section.title.to_lowercase();
    let content = section.content.to_lowercase();
    let combined = format!("{} {}", title, content);

    let hits = |terms: &[String], haystack: &str| -> f64 {
        terms.iter().filter(|t| haystack.contains(t.as_str())).count() as f64
    };

    let mut score = 0.0;
    score += hits(&keywords.persona, &combined) * 2.0;
    score += hits(&keywords.job, &combined) * 3.0;
    score += hits(&keywords.persona, &title) * 1.5;
    score += hits(&keywords.job, &title) * 2.0;
    score += hits(&keywords.numbers, &combined) * 1.5;
    score += hits(&keywords.durations, &combined) * 1.0;

    let word_count = content.split_whitespace().count();
    if word_count > 50 {
        score += (word_count as f64 / 100.0).min(2.0);
    }

    (score * 100.0).round() / 100.0
}

pub struct RelevanceRanker<'a> {
    config: &'a RankConfig,
    embedder: Option<&'a dyn EmbeddingModel>,
}

impl<'a> RelevanceRanker<'a> {
    pub fn new(config: &'a RankConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    pub fn with_embedder(mut self, embedder: &'a dyn EmbeddingModel) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Score, sort and keep the best `top_n` sections. An empty result is
    /// not an error.
    pub fn rank(
        &self,
        sections: &[Section],
        persona: &str,
        job: &str,
        top_n: usize,
    ) -> Result<Vec<RankedSection>> {
        let scored = match self.config.strategy {
            Strategy::Lexical => self.score_lexical(sections, persona, job),
            Strategy::Semantic => self.score_semantic(sections, job)?,
            Strategy::Hybrid => self.score_hybrid(sections, persona, job)?,
        };
        debug!(
            "{:?} scoring kept {} of {} sections",
            self.config.strategy,
            scored.len(),
            sections.len()
        );
        Ok(select_top(scored, top_n))
    }

    fn score_lexical(&self, sections: &[Section], persona: &str, job: &str) -> Vec<(Section, f64)> {
        let keywords = QueryKeywords::extract(persona, job);
        sections
            .iter()
            .filter(|s| !is_boilerplate_title(&s.title))
            .map(|s| (s.clone(), lexical_score(s, &keywords)))
            .collect()
    }

    /// Sections worth embedding, paired with their cleaned passage.
    fn passages<'s>(&self, sections: &'s [Section]) -> Vec<(&'s Section, String)> {
        sections
            .iter()
            .filter(|s| !s.title.trim().is_empty() && !s.content.trim().is_empty())
            .filter(|s| !is_boilerplate_title(s.title.trim()))
            .map(|s| (s, clean_passage(&s.content)))
            .filter(|(_, text)| text.split_whitespace().count() >= self.config.min_passage_words)
            .collect()
    }

    fn embed_scores(&self, job: &str, passages: &[(&Section, String)]) -> Result<Vec<f64>> {
        let embedder = self
            .embedder
            .ok_or_else(|| Error::Model("no embedding model configured".to_string()))?;
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch = Vec::with_capacity(passages.len() + 1);
        batch.push(format!("query: {}", job));
        batch.extend(passages.iter().map(|(_, text)| format!("passage: {}", text)));

        let vectors = embedder.embed(&batch)?;
        if vectors.len() != batch.len() {
            return Err(Error::Model(format!(
                "embedding model returned {} vectors for {} inputs",
                vectors.len(),
                batch.len()
            )));
        }
        let (query, passage_vectors) = vectors.split_at(1);
        Ok(passage_vectors
            .iter()
            .map(|v| cosine_similarity(&query[0], v))
            .collect())
    }

    fn score_semantic(&self, sections: &[Section], job: &str) -> Result<Vec<(Section, f64)>> {
        let passages = self.passages(sections);
        let scores = self.embed_scores(job, &passages)?;
        Ok(passages
            .into_iter()
            .zip(scores)
            .map(|((section, _), score)| (section.clone(), score))
            .collect())
    }

    fn score_hybrid(&self, sections: &[Section], persona: &str, job: &str) -> Result<Vec<(Section, f64)>> {
        let passages = self.passages(sections);
        let semantic = self.embed_scores(job, &passages)?;

        let keywords = QueryKeywords::extract(persona, job);
        let lexical: Vec<f64> = passages
            .iter()
            .map(|(section, _)| lexical_score(section, &keywords))
            .collect();
        let max_lexical = lexical.iter().cloned().fold(0.0, f64::max);

        let weight = self.config.semantic_weight.clamp(0.0, 1.0);
        Ok(passages
            .into_iter()
            .zip(semantic.into_iter().zip(lexical))
            .map(|((section, _), (sem, lex))| {
                let lex_norm = if max_lexical > 0.0 { lex / max_lexical } else { 0.0 };
                (section.clone(), weight * sem + (1.0 - weight) * lex_norm)
            })
            .collect())
    }

    /// Chunk the best sections into short readable excerpts.
    pub fn refine(&self, ranked: &[RankedSection]) -> Vec<SubSection> {
        let mut subsections = Vec::new();
        let chunk_size = self.config.chunk_sentences.max(1);

        'sections: for ranked_section in ranked.iter().take(self.config.refine_sections) {
            let section = &ranked_section.section;
            let sentences: Vec<&str> = SENTENCE_END.split(&section.content).collect();

            for chunk in sentences.chunks(chunk_size) {
                let joined = chunk.join(" ");
                let joined = joined.trim();
                if joined.chars().count() <= self.config.min_chunk_chars {
                    continue;
                }
                subsections.push(SubSection {
                    document: section.document.clone(),
                    section_title: section.title.clone(),
                    refined_text: refine_text(joined),
                    page_number: section.page_start,
                });
                if subsections.len() >= self.config.max_subsections {
                    break 'sections;
                }
            }
        }

        info!("refined {} sub-sections", subsections.len());
        subsections
    }
}

fn select_top(mut scored: Vec<(Section, f64)>, top_n: usize) -> Vec<RankedSection> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (section, score))| RankedSection {
            section,
            score,
            importance_rank: i + 1,
        })
        .collect()
}

/// Normalize whitespace, cut a dangling tail back to the last sentence end
/// when that end is late in the chunk, and capitalize the first letter.
pub fn refine_text(text: &str) -> String {
    const TERMINALS: [char; 3] = ['.', '!', '?'];

    let mut text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() && !text.ends_with(TERMINALS) {
        if let Some(last) = text.rfind(TERMINALS) {
            if last as f64 > text.len() as f64 * 0.7 {
                text.truncate(last + 1);
            }
        }
    }

    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => text,
    }
}
