//! Span Resolver: planned regions to the content units they cover.

use crate::layout::{clip, PageLayout, RunRef, StreamKey};
use blackletter_core::{Label, PlannedAction, Rect, RedactionAction, RedactionConfig, RedactionPlan};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SpanTarget {
    /// Glyphs to delete from a text-showing operator.
    Text(RunRef),
    /// A drawn graphic to cover.
    Graphic { stream: StreamKey, op_index: usize },
    /// The governing rectangle itself.
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSpan {
    pub region_id: usize,
    pub page_index: usize,
    /// `Remove` for text, `Mask` for everything drawn over.
    pub action: RedactionAction,
    pub target: SpanTarget,
    /// Overlap of the unit with the governing rectangle.
    pub rect: Rect,
    /// Full extent of the unit.
    pub unit_bbox: Rect,
    pub text: Option<String>,
}

/// Rectangle of one active plan entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionArea {
    pub region_id: usize,
    pub page_index: usize,
    pub label: Label,
    pub action: RedactionAction,
    pub rect: Rect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedPlan {
    pub spans: Vec<ResolvedSpan>,
    pub areas: Vec<ActionArea>,
    /// Active regions that cover nothing.
    pub unresolved: Vec<usize>,
}

impl ResolvedPlan {
    pub fn pages(&self) -> BTreeSet<usize> {
        self.spans.iter().map(|s| s.page_index).collect()
    }

    pub fn spans_on(&self, page_index: usize) -> impl Iterator<Item = &ResolvedSpan> {
        self.spans.iter().filter(move |s| s.page_index == page_index)
    }

    pub fn areas_on(&self, page_index: usize) -> impl Iterator<Item = &ActionArea> {
        self.areas.iter().filter(move |a| a.page_index == page_index)
    }

    pub fn count(&self, action: RedactionAction) -> usize {
        self.spans.iter().filter(|s| s.action == action).count()
    }

    /// Text of the runs resolved for `region_id`, in content order.
    pub fn text_for_region(&self, region_id: usize) -> String {
        self.spans
            .iter()
            .filter(|s| s.region_id == region_id)
            .filter_map(|s| s.text.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Maps every active action of `plan` onto the content of its page.
///
/// Pages are resolved independently. Within a page, a text run belongs to
/// the first action (in reading order) that claims it.
pub fn resolve(plan: &RedactionPlan, layouts: &[PageLayout], config: &RedactionConfig) -> ResolvedPlan {
    let mut by_page: BTreeMap<usize, Vec<&PlannedAction>> = BTreeMap::new();
    for action in plan.active() {
        by_page.entry(action.region.page_index).or_default().push(action);
    }

    let per_page: Vec<(Vec<ResolvedSpan>, Vec<usize>)> = by_page
        .par_iter()
        .map(|(page_index, actions)| match layouts.get(*page_index) {
            Some(layout) => resolve_page(layout, actions, config),
            None => {
                log::warn!("[Resolve] page {} has no layout", page_index);
                (Vec::new(), actions.iter().map(|a| a.region.id).collect())
            }
        })
        .collect();

    let mut resolved = ResolvedPlan {
        areas: plan
            .active()
            .map(|a| ActionArea {
                region_id: a.region.id,
                page_index: a.region.page_index,
                label: a.region.label,
                action: a.action,
                rect: a.region.bbox,
            })
            .collect(),
        ..Default::default()
    };
    for (spans, unresolved) in per_page {
        resolved.spans.extend(spans);
        resolved.unresolved.extend(unresolved);
    }

    log::info!(
        "[Resolve] {} spans ({} remove, {} mask) across {} pages, {} regions unresolved",
        resolved.spans.len(),
        resolved.count(RedactionAction::Remove),
        resolved.count(RedactionAction::Mask),
        resolved.pages().len(),
        resolved.unresolved.len()
    );
    resolved
}

fn resolve_page(
    layout: &PageLayout,
    actions: &[&PlannedAction],
    config: &RedactionConfig,
) -> (Vec<ResolvedSpan>, Vec<usize>) {
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut spans = Vec::new();
    let mut unresolved = Vec::new();
    let background = layout.bounds.area() * config.background_area_fraction;

    for action in actions {
        let region = &action.region;
        let rect = region.bbox;
        let before = spans.len();

        for (index, run) in layout.runs.iter().enumerate() {
            if claimed.contains(&index) {
                continue;
            }
            let on_page = clip(&run.bbox, &layout.bounds);
            if on_page.overlap_fraction(&rect) > config.overlap_fraction {
                claimed.insert(index);
                spans.push(ResolvedSpan {
                    region_id: region.id,
                    page_index: layout.page_index,
                    action: RedactionAction::Remove,
                    target: SpanTarget::Text(run.reference),
                    rect: on_page.intersection(&rect).unwrap_or(on_page),
                    unit_bbox: run.bbox,
                    text: Some(run.text.clone()),
                });
            }
        }

        match action.action {
            RedactionAction::Mask => spans.push(ResolvedSpan {
                region_id: region.id,
                page_index: layout.page_index,
                action: RedactionAction::Mask,
                target: SpanTarget::Area,
                rect,
                unit_bbox: rect,
                text: None,
            }),
            RedactionAction::Remove => {
                for graphic in &layout.graphics {
                    if graphic.bbox.area() >= background {
                        continue;
                    }
                    let Some(overlap) = graphic.bbox.intersection(&rect) else {
                        continue;
                    };
                    spans.push(ResolvedSpan {
                        region_id: region.id,
                        page_index: layout.page_index,
                        action: RedactionAction::Mask,
                        target: SpanTarget::Graphic {
                            stream: graphic.stream,
                            op_index: graphic.op_index,
                        },
                        rect: overlap,
                        unit_bbox: graphic.bbox,
                        text: None,
                    });
                }
            }
            RedactionAction::Ignore => {}
        }

        if spans.len() == before {
            log::debug!(
                "[Resolve] region {} ({}) on page {} covers no content",
                region.id,
                region.label,
                layout.page_index
            );
            unresolved.push(region.id);
        }
    }
    (spans, unresolved)
}
