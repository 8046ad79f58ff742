//! Outline JSON for a single document: a title plus leveled headings.

use crate::model::{Heading, Outline, OutlineEntry, Run};

/// Pick the document title from the merged runs of the first page.
///
/// The largest run wins; consecutive runs of the same size right after it
/// are its wrapped lines and get joined. Page furniture (URLs, emails,
/// copyright lines, page labels) is never a title.
pub fn document_title(first_page: &[Run], fallback: &str) -> String {
    let candidates: Vec<&Run> = first_page
        .iter()
        .filter(|r| is_title_candidate(r.text.trim()))
        .collect();

    let Some(largest) = candidates
        .iter()
        .map(|r| r.size)
        .fold(None, |max: Option<f32>, size| match max {
            Some(m) if m >= size => Some(m),
            _ => Some(size),
        })
    else {
        return fallback.to_string();
    };

    let title = candidates
        .iter()
        .skip_while(|r| r.size != largest)
        .take_while(|r| r.size == largest)
        .map(|r| r.text.trim())
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() {
        fallback.to_string()
    } else {
        title
    }
}

fn is_title_candidate(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    let lower = line.to_lowercase();
    !(lower.starts_with("page ")
        || lower.contains("http")
        || lower.contains("www.")
        || line.contains('@')
        || line.contains('©'))
}

pub fn build_outline(title: String, headings: &[Heading]) -> Outline {
    Outline {
        title,
        outline: headings
            .iter()
            .map(|h| OutlineEntry {
                level: format!("H{}", h.level),
                text: h.text().to_string(),
                page: h.page().saturating_sub(1),
            })
            .collect(),
    }
}
