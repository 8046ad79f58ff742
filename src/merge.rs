//! Coalescing of backend fragments into logical runs.
//!
//! Layout backends split one visual line into several spans (kerning,
//! style changes, baseline jitter) and one paragraph into one span per line.
//! Two left-to-right passes stitch them back together:
//!
//! 1. fragments on the same baseline (within `y_tolerance`) and block,
//! 2. runs sharing base family, size and color whose x does not move left.
//!
//! A run set in a bullet font always merges into the run after it, and the
//! follower's identity wins so a bullet glyph never decides how a line looks.

use log::debug;

use crate::config::MergeConfig;
use crate::font_utils::{base_family, is_bullet_font};
use crate::model::{Run, Span};

pub struct SpanMerger<'a> {
    config: &'a MergeConfig,
}

impl<'a> SpanMerger<'a> {
    pub fn new(config: &'a MergeConfig) -> Self {
        Self { config }
    }

    pub fn merge(&self, spans: &[Span]) -> Vec<Run> {
        let by_line = self.merge_pass(spans.to_vec(), |a, b| self.same_line(a, b));
        let runs = self.merge_pass(by_line, |a, b| self.same_font_flow(a, b));
        debug!("merged {} spans into {} runs", spans.len(), runs.len());
        runs
    }

    fn merge_pass<F>(&self, items: Vec<Run>, can_merge: F) -> Vec<Run>
    where
        F: Fn(&Run, &Run) -> bool,
    {
        let mut merged: Vec<Run> = Vec::with_capacity(items.len());
        for next in items {
            match merged.last_mut() {
                Some(current)
                    if current.page == next.page
                        && (self.is_bullet(current) || can_merge(current, &next)) =>
                {
                    *current = self.join(current, next);
                }
                _ => merged.push(next),
            }
        }
        merged
    }

    fn same_line(&self, a: &Run, b: &Run) -> bool {
        (a.origin.y - b.origin.y).abs() < self.config.y_tolerance && a.block_id == b.block_id
    }

    fn same_font_flow(&self, a: &Run, b: &Run) -> bool {
        base_family(&a.font) == base_family(&b.font)
            && a.size == b.size
            && a.color == b.color
            && b.origin.x >= a.origin.x
            && (!self.config.same_block_only || a.block_id == b.block_id)
    }

    fn is_bullet(&self, run: &Run) -> bool {
        is_bullet_font(&run.font, &self.config.bullet_fonts)
    }

    /// Append `next` to `base`. The base keeps its identity unless it is a
    /// bullet glyph, in which case the follower's font, size, color, style
    /// and origin take over.
    fn join(&self, base: &Run, next: Run) -> Run {
        let text = match (base.text.is_empty(), next.text.is_empty()) {
            (true, _) => next.text.clone(),
            (_, true) => base.text.clone(),
            _ => format!("{} {}", base.text, next.text),
        };

        if self.is_bullet(base) {
            Run { text, ..next }
        } else {
            Run {
                text,
                ..base.clone()
            }
        }
    }
}
