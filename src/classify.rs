//! Heading detection over merged runs.
//!
//! [`HeadingClassifier`] decides one run at a time from its text shape,
//! size and weight. [`SimilarityFilter`] removes runs that look exactly like
//! their neighbours before the classifier sees them, and [`detect_headings`]
//! strings both together for one page.

use std::collections::BTreeSet;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::HeadingRules;
use crate::error::Result;
use crate::font_utils::base_family;
use crate::model::Run;
use crate::nlp::GrammaticalAnalyzer;

/// "Appendix A: Scope", "Phase II: Planning"
pub static STRUCTURED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-zA-Z]+\s+[A-Z0-9]+:\s?.+").unwrap());
/// "1. Introduction", "2.3 Public Libraries"
pub static NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*\.?\s+[A-Z]").unwrap());

pub struct HeadingClassifier<'a> {
    rules: &'a HeadingRules,
    analyzer: &'a dyn GrammaticalAnalyzer,
}

impl<'a> HeadingClassifier<'a> {
    pub fn new(rules: &'a HeadingRules, analyzer: &'a dyn GrammaticalAnalyzer) -> Self {
        Self { rules, analyzer }
    }

    /// First matching rule wins. Depends only on the run and the analyzer.
    pub fn classify(&self, run: &Run) -> Result<bool> {
        let text = run.text.trim();
        if text.is_empty() {
            return Ok(false);
        }
        let word_count = text.split_whitespace().count();
        let ends_with_colon = text.ends_with(':');
        let is_bold = run.is_bold();
        let rules = self.rules;

        if rules.strict_period && text.ends_with('.') {
            return Ok(false);
        }

        if STRUCTURED_HEADING.is_match(text) {
            return Ok(true);
        }

        if NUMBERED_HEADING.is_match(text) && word_count <= rules.numbered_max_words {
            return Ok(true);
        }

        if ends_with_colon {
            if word_count > rules.colon_max_words {
                return Ok(false);
            }
            // A complete clause ending in a colon introduces a list unless emphasized.
            if !is_bold && self.analyzer.is_clause(text)? {
                return Ok(false);
            }
        }

        Ok(run.size >= rules.large_size
            || (is_bold && run.size >= rules.bold_min_size && word_count <= rules.bold_max_words)
            || (ends_with_colon && word_count <= rules.colon_max_words))
    }
}

/// Marks runs that share family, size and color with an adjacent run while
/// neither is bold. Uniform neighbours are body text.
pub struct SimilarityFilter;

impl SimilarityFilter {
    pub fn excluded_indices(runs: &[Run]) -> BTreeSet<usize> {
        let mut excluded = BTreeSet::new();
        for (idx, pair) in runs.windows(2).enumerate() {
            if Self::indistinguishable(&pair[0], &pair[1]) {
                excluded.insert(idx);
                excluded.insert(idx + 1);
            }
        }
        excluded
    }

    fn indistinguishable(a: &Run, b: &Run) -> bool {
        base_family(&a.font) == base_family(&b.font)
            && a.size == b.size
            && a.color == b.color
            && !a.is_bold()
            && !b.is_bold()
    }
}

/// Headings found on one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageHeadings {
    pub headings: Vec<Run>,
    /// Continuation lines folded into a wrapped heading. They are heading
    /// text and must not show up as body text.
    pub absorbed: Vec<Run>,
}

impl PageHeadings {
    /// Runs that are neither a heading nor part of one. A joined heading
    /// keeps the page and origin of its first line, so both are matched by
    /// position.
    pub fn body<'r>(&'r self, runs: &'r [Run]) -> impl Iterator<Item = &'r Run> + 'r {
        runs.iter().filter(move |r| {
            !self
                .headings
                .iter()
                .chain(&self.absorbed)
                .any(|h| h.page == r.page && h.origin == r.origin)
        })
    }
}

/// Heading candidates for one page's runs, in order.
pub fn detect_headings(
    runs: &[Run],
    classifier: &HeadingClassifier<'_>,
    rules: &HeadingRules,
) -> Result<PageHeadings> {
    let skip = SimilarityFilter::excluded_indices(runs);

    let mut headings = Vec::new();
    for (idx, run) in runs.iter().enumerate() {
        if skip.contains(&idx) {
            continue;
        }
        if let Some(margin) = rules.max_left_margin {
            if run.origin.x > margin {
                continue;
            }
        }
        if classifier.classify(run)? {
            headings.push(run.clone());
        }
    }

    let joined = join_wrapped_headings(headings, rules);
    debug!(
        "{} of {} runs kept as headings ({} wrapped lines joined, {} suppressed as body text)",
        joined.headings.len(),
        runs.len(),
        joined.absorbed.len(),
        skip.len()
    );
    Ok(joined)
}

/// Join consecutive headings that are the wrapped lines of one title:
/// same page, same family, near-equal size, small vertical gap.
pub fn join_wrapped_headings(headings: Vec<Run>, rules: &HeadingRules) -> PageHeadings {
    let mut page = PageHeadings::default();
    let mut last_line_y = f32::NEG_INFINITY;

    for heading in headings {
        let line_y = heading.origin.y;
        match page.headings.last_mut() {
            Some(current)
                if current.page == heading.page
                    && base_family(&current.font) == base_family(&heading.font)
                    && (current.size - heading.size).abs() < rules.multiline_size_tolerance
                    && (line_y - last_line_y).abs() < rules.multiline_gap =>
            {
                current.text = format!("{} {}", current.text.trim(), heading.text.trim());
                page.absorbed.push(heading);
            }
            _ => page.headings.push(heading),
        }
        last_line_y = line_y;
    }
    page
}
