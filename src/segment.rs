//! Sections from the text between consecutive headings.

use std::cmp::Ordering;

use crate::model::{Heading, Run, Section};

/// Anything that marks where a section starts.
pub trait Anchor {
    fn run(&self) -> &Run;

    fn level(&self) -> Option<u32> {
        None
    }
}

impl Anchor for Run {
    fn run(&self) -> &Run {
        self
    }
}

impl Anchor for Heading {
    fn run(&self) -> &Run {
        &self.run
    }

    fn level(&self) -> Option<u32> {
        Some(self.level)
    }
}

/// A heading candidate with the level the hierarchy gave it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct LeveledRun {
    pub run: Run,
    pub level: Option<u32>,
}

impl Anchor for LeveledRun {
    fn run(&self) -> &Run {
        &self.run
    }

    fn level(&self) -> Option<u32> {
        self.level
    }
}

#[derive(Debug, Clone, Copy)]
struct Boundary {
    page: usize,
    y: f32,
}

/// Split a document's runs into one section per heading.
///
/// `runs` is every run of the document in reading order. A run belongs to
/// the section of heading `h` when it lies strictly after `h` and strictly
/// before the next heading, comparing by page and then by baseline. Text
/// before the first heading belongs to no section.
pub fn segment<A: Anchor>(document: &str, runs: &[Run], headings: &[A]) -> Vec<Section> {
    let Some(last_page) = runs
        .iter()
        .map(|r| r.page)
        .chain(headings.iter().map(|h| h.run().page))
        .max()
    else {
        return Vec::new();
    };

    let mut ordered: Vec<&A> = headings.iter().collect();
    ordered.sort_by(|a, b| {
        let (a, b) = (a.run(), b.run());
        a.page
            .cmp(&b.page)
            .then(a.origin.y.partial_cmp(&b.origin.y).unwrap_or(Ordering::Equal))
    });

    let mut boundaries: Vec<Boundary> = ordered
        .iter()
        .map(|h| Boundary {
            page: h.run().page,
            y: h.run().origin.y,
        })
        .collect();
    boundaries.push(Boundary {
        page: last_page,
        y: f32::INFINITY,
    });

    ordered
        .iter()
        .zip(boundaries.windows(2))
        .map(|(heading, bounds)| {
            let (current, next) = (bounds[0], bounds[1]);
            let content = runs
                .iter()
                .filter(|r| r.page >= current.page && r.page <= next.page)
                .filter(|r| !(r.page == current.page && r.origin.y <= current.y))
                .filter(|r| !(r.page == next.page && r.origin.y >= next.y))
                .map(|r| r.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            Section {
                document: document.to_string(),
                page_start: current.page,
                page_end: next.page,
                title: heading.run().text.trim().to_string(),
                content: content.trim().to_string(),
                level: heading.level(),
            }
        })
        .collect()
}
