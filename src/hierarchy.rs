//! Nesting levels from visual cues.
//!
//! One pass over the headings in document order with a stack of open
//! frames. [`HierarchyAssigner::relate`] is the only place that decides how
//! an open heading and a new one relate; the loop in `assign` just pops
//! until a frame dominates the candidate.

use log::debug;

use crate::config::HierarchyConfig;
use crate::model::{Heading, Run};

/// Page facts the front-matter check needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentGeometry {
    pub page_count: usize,
    pub first_page_height: f32,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    size: f32,
    weight_rank: u8,
    page: usize,
    y: f32,
    level: u32,
}

impl Frame {
    fn of(run: &Run, level: u32) -> Self {
        Self {
            size: run.size,
            weight_rank: run.style.weight_rank(),
            page: run.page,
            y: run.origin.y,
            level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    /// The open frame dominates: the candidate nests under it.
    Parent,
    /// Same rank, candidate at or below: the frame closes, popping stops.
    Sibling,
    /// The frame is closed by the candidate; keep popping.
    Closed,
}

pub struct HierarchyAssigner<'a> {
    config: &'a HierarchyConfig,
}

impl<'a> HierarchyAssigner<'a> {
    pub fn new(config: &'a HierarchyConfig) -> Self {
        Self { config }
    }

    pub fn assign(&self, candidates: &[Run], geometry: &DocumentGeometry) -> Vec<Heading> {
        candidates
            .iter()
            .zip(self.levels(candidates, geometry))
            .filter_map(|(run, level)| {
                level.map(|level| Heading {
                    run: run.clone(),
                    level,
                })
            })
            .collect()
    }

    /// One entry per candidate, by index. `None` marks a dropped
    /// front-matter heading.
    pub fn levels(&self, candidates: &[Run], geometry: &DocumentGeometry) -> Vec<Option<u32>> {
        let skip_first_page =
            self.config.exclude_front_matter && self.is_front_matter(candidates, geometry);
        if skip_first_page {
            debug!("page 1 looks like a cover page, dropping its headings");
        }

        let mut stack: Vec<Frame> = Vec::new();
        let mut levels = Vec::with_capacity(candidates.len());

        for run in candidates {
            if skip_first_page && run.page == 1 {
                levels.push(None);
                continue;
            }
            let candidate = Frame::of(run, 0);

            let level = if run.size > self.config.top_level_size {
                stack.clear();
                1
            } else {
                loop {
                    let Some(open) = stack.last() else {
                        break 1;
                    };
                    match self.relate(open, &candidate) {
                        Relation::Parent => break open.level + 1,
                        Relation::Sibling => {
                            stack.pop();
                            break stack.last().map_or(1, |f| f.level + 1);
                        }
                        Relation::Closed => {
                            stack.pop();
                        }
                    }
                }
            };

            stack.push(Frame { level, ..candidate });
            levels.push(Some(level));
        }

        levels
    }

    /// Larger size dominates, then heavier weight; on a full tie a candidate
    /// above the open frame closes it, anything else is its sibling.
    fn relate(&self, open: &Frame, candidate: &Frame) -> Relation {
        let size_delta = open.size - candidate.size;
        if size_delta > self.config.size_epsilon {
            return Relation::Parent;
        }
        if size_delta < -self.config.size_epsilon {
            return Relation::Closed;
        }
        if open.weight_rank != candidate.weight_rank {
            return if open.weight_rank > candidate.weight_rank {
                Relation::Parent
            } else {
                Relation::Closed
            };
        }
        if candidate.page == open.page && candidate.y < open.y {
            Relation::Closed
        } else {
            Relation::Sibling
        }
    }

    /// A multi-page document whose first page carries only a few headings,
    /// or only headings in its upper half, starts with a cover page.
    pub fn is_front_matter(&self, candidates: &[Run], geometry: &DocumentGeometry) -> bool {
        if geometry.page_count <= 1 {
            return false;
        }
        let first_page: Vec<&Run> = candidates.iter().filter(|r| r.page == 1).collect();
        if first_page.is_empty() {
            return false;
        }
        let few = first_page.len() <= self.config.front_matter_max_headings;
        let upper_half = first_page
            .iter()
            .all(|r| r.origin.y < geometry.first_page_height / 2.0);
        few || upper_half
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;

    fn heading(text: &str, font: &str, size: f32, page: usize, y: f32) -> Run {
        Run::new(text, font, size, Point::new(72.0, y), 0, page)
    }

    fn single_page() -> DocumentGeometry {
        DocumentGeometry {
            page_count: 1,
            first_page_height: 792.0,
        }
    }

    fn levels(headings: &[Heading]) -> Vec<u32> {
        headings.iter().map(|h| h.level).collect()
    }

    #[test]
    fn test_large_heading_resets_hierarchy() {
        let config = HierarchyConfig::default();
        let candidates = vec![
            heading("Guide", "Arial", 18.0, 1, 100.0),
            heading("Beaches", "Arial", 13.0, 1, 200.0),
            heading("Markets", "Arial", 13.0, 1, 400.0),
            heading("Cities", "Arial", 16.0, 1, 600.0),
        ];
        let headings = HierarchyAssigner::new(&config).assign(&candidates, &single_page());
        assert_eq!(levels(&headings), vec![1, 2, 2, 1]);
    }

    #[test]
    fn test_weight_breaks_size_ties() {
        let config = HierarchyConfig::default();
        let candidates = vec![
            heading("Nice", "Arial,Bold", 14.0, 1, 100.0),
            heading("Old Town", "Arial", 14.0, 1, 200.0),
            heading("Cannes", "Arial,Bold", 14.0, 1, 300.0),
            heading("Festival", "Arial", 14.0, 1, 400.0),
            heading("Tickets", "Arial", 12.0, 1, 500.0),
        ];
        let headings = HierarchyAssigner::new(&config).assign(&candidates, &single_page());
        assert_eq!(levels(&headings), vec![1, 2, 1, 2, 3]);
    }

    #[test]
    fn test_candidate_above_open_frame_closes_it() {
        let config = HierarchyConfig::default();
        let candidates = vec![
            heading("Regions", "Arial", 14.0, 1, 100.0),
            heading("East", "Arial", 12.0, 1, 400.0),
            heading("West", "Arial", 12.0, 1, 250.0),
            heading("Details", "Arial", 10.0, 1, 300.0),
        ];
        let headings = HierarchyAssigner::new(&config).assign(&candidates, &single_page());
        assert_eq!(levels(&headings), vec![1, 2, 2, 3]);
    }

    #[test]
    fn test_deeper_levels_never_skip() {
        let config = HierarchyConfig::default();
        let candidates = vec![
            heading("A", "Arial", 14.0, 1, 50.0),
            heading("B", "Arial", 12.0, 1, 100.0),
            heading("C", "Arial", 11.0, 1, 150.0),
            heading("D", "Arial", 10.0, 1, 200.0),
            heading("E", "Arial", 12.0, 2, 50.0),
            heading("F", "Arial", 9.0, 2, 100.0),
            heading("G", "Arial", 14.0, 2, 150.0),
            heading("H", "Arial,Bold", 14.0, 2, 200.0),
        ];
        let headings = HierarchyAssigner::new(&config).assign(
            &candidates,
            &DocumentGeometry {
                page_count: 2,
                first_page_height: 792.0,
            },
        );
        let config_no_front = HierarchyConfig {
            exclude_front_matter: false,
            ..config.clone()
        };
        let all = HierarchyAssigner::new(&config_no_front).assign(
            &candidates,
            &DocumentGeometry {
                page_count: 2,
                first_page_height: 792.0,
            },
        );

        assert_eq!(levels(&all), vec![1, 2, 3, 4, 2, 3, 1, 1]);
        // Page 1 is all in the upper half, so it reads as a cover page.
        assert_eq!(levels(&headings), vec![1, 2, 1, 1]);

        for pair in all.windows(2) {
            assert!(pair[1].level >= 1);
            assert!(pair[1].level <= pair[0].level + 1);
        }
    }

    #[test]
    fn test_front_matter_detection() {
        let config = HierarchyConfig::default();
        let assigner = HierarchyAssigner::new(&config);
        let two_pages = DocumentGeometry {
            page_count: 2,
            first_page_height: 800.0,
        };

        let cover = vec![
            heading("Annual Report", "Arial", 24.0, 1, 300.0),
            heading("Overview", "Arial", 16.0, 2, 80.0),
        ];
        assert!(assigner.is_front_matter(&cover, &two_pages));
        assert!(!assigner.is_front_matter(&cover, &single_page()));

        let mut busy = vec![
            heading("One", "Arial", 14.0, 1, 100.0),
            heading("Two", "Arial", 14.0, 1, 300.0),
            heading("Three", "Arial", 14.0, 1, 500.0),
            heading("Four", "Arial", 14.0, 1, 700.0),
        ];
        assert!(!assigner.is_front_matter(&busy, &two_pages));
        busy.truncate(2);
        assert!(assigner.is_front_matter(&busy, &two_pages));

        let headings = assigner.assign(&cover, &two_pages);
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].text(), "Overview");
        assert_eq!(headings[0].level, 1);
    }

    #[test]
    fn test_levels_align_with_candidates() {
        let config = HierarchyConfig::default();
        let assigner = HierarchyAssigner::new(&config);
        let geometry = DocumentGeometry {
            page_count: 2,
            first_page_height: 800.0,
        };
        let candidates = vec![
            heading("Annual Report", "Arial", 24.0, 1, 300.0),
            heading("Notes", "Arial", 14.0, 2, 80.0),
            heading("Details", "Arial", 12.0, 2, 200.0),
            heading("Notes", "Arial", 12.0, 2, 400.0),
        ];
        assert_eq!(
            assigner.levels(&candidates, &geometry),
            vec![None, Some(1), Some(2), Some(2)]
        );
        assert_eq!(levels(&assigner.assign(&candidates, &geometry)), vec![1, 2, 2]);
    }

    #[test]
    fn test_empty_input() {
        let config = HierarchyConfig::default();
        assert!(HierarchyAssigner::new(&config)
            .assign(&[], &single_page())
            .is_empty());
    }
}
