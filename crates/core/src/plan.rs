//! Region Classification State Machine.
//!
//! One [`Automaton`] walks the whole document in reading order. Its
//! transition function [`Automaton::step`] is pure: it never mutates the
//! receiver and returns the next automaton together with the decision for
//! the region, so the transition table can be exercised without any
//! document at hand.
//!
//! | state         | input                       | action        | next          |
//! |---------------|-----------------------------|---------------|---------------|
//! | IDLE          | CAPTION                     | Remove / Mask | IN_CAPTION    |
//! | IDLE          | KEY_CITE                    | Remove        | IN_KEY_CITE   |
//! | IDLE          | HEADNOTE                    | Remove        | IN_HEADNOTE   |
//! | IDLE          | SYLLABUS                    | Remove        | IDLE          |
//! | IDLE          | anything else               | Ignore        | IDLE          |
//! | IN_x          | same label, within gap      | Remove        | IN_x          |
//! | IN_x          | anything else               | close, then dispatch as IDLE  |

use crate::config::RedactionConfig;
use crate::geometry::Rect;
use crate::normalize::reading_order;
use crate::region::{Label, NormalizedRegion};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type BlockId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlannerState {
    Idle,
    InHeadnoteBlock,
    InKeyCiteBlock,
    InCaptionBlock,
}

impl PlannerState {
    fn opened_by(label: Label) -> Option<PlannerState> {
        match label {
            Label::Caption => Some(PlannerState::InCaptionBlock),
            Label::KeyCite => Some(PlannerState::InKeyCiteBlock),
            Label::Headnote => Some(PlannerState::InHeadnoteBlock),
            _ => None,
        }
    }

    fn block_label(&self) -> Option<Label> {
        match self {
            PlannerState::Idle => None,
            PlannerState::InHeadnoteBlock => Some(Label::Headnote),
            PlannerState::InKeyCiteBlock => Some(Label::KeyCite),
            PlannerState::InCaptionBlock => Some(Label::Caption),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedactionAction {
    #[serde(rename = "remove-text")]
    Remove,
    #[serde(rename = "mask-area")]
    Mask,
    #[serde(rename = "ignore")]
    Ignore,
}

/// Where the previous region of the open block sits.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RegionGeometry {
    page_index: usize,
    bbox: Rect,
    page_bounds: Rect,
}

impl RegionGeometry {
    fn of(region: &NormalizedRegion) -> Self {
        Self {
            page_index: region.page_index,
            bbox: region.bbox,
            page_bounds: region.page_bounds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub block_id: BlockId,
    pub label: Label,
    pub first_page: usize,
    pub last_page: usize,
    pub region_count: usize,
}

/// Decision for a single region.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub action: RedactionAction,
    pub continuation_id: Option<BlockId>,
    /// Block closed by this input, if any.
    pub closed: Option<BlockSummary>,
}

impl Step {
    fn ignore() -> Self {
        Self {
            action: RedactionAction::Ignore,
            continuation_id: None,
            closed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Automaton {
    state: PlannerState,
    open_block_id: Option<BlockId>,
    last_region_geometry: Option<RegionGeometry>,
    open_block: Option<BlockSummary>,
    next_block_id: BlockId,
}

impl Default for Automaton {
    fn default() -> Self {
        Self::new()
    }
}

impl Automaton {
    pub fn new() -> Self {
        Self {
            state: PlannerState::Idle,
            open_block_id: None,
            last_region_geometry: None,
            open_block: None,
            next_block_id: 1,
        }
    }

    pub fn state(&self) -> PlannerState {
        self.state
    }

    pub fn open_block_id(&self) -> Option<BlockId> {
        self.open_block_id
    }

    /// Whether `region` would extend the currently open block.
    pub fn continues_block(&self, region: &NormalizedRegion, config: &RedactionConfig) -> bool {
        match (self.state.block_label(), self.last_region_geometry.as_ref()) {
            (Some(label), Some(last)) if label == region.label => {
                vertical_gap(last, region, config)
                    .map(|gap| gap <= config.gap_threshold_pts)
                    .unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Advances the automaton by one region.
    ///
    /// `protected` marks a caption that contains a protected logo and is
    /// therefore masked instead of removed.
    pub fn step(
        &self,
        region: &NormalizedRegion,
        protected: bool,
        config: &RedactionConfig,
    ) -> (Automaton, Step) {
        // Low-confidence regions and page furniture are invisible to the
        // automaton: they neither open nor close a block.
        if region.confidence < config.confidence_threshold {
            return (self.clone(), Step::ignore());
        }
        if config.furniture_labels.contains(&region.label) && is_furniture(region.label) {
            return (self.clone(), Step::ignore());
        }

        let mut next = self.clone();

        if self.continues_block(region, config) {
            next.extend(region);
            let step = Step {
                action: action_for(region.label, protected),
                continuation_id: next.open_block_id,
                closed: None,
            };
            return (next, step);
        }

        let closed = next.close();
        let (action, continuation_id) = next.dispatch_idle(region, protected);
        (
            next,
            Step {
                action,
                continuation_id,
                closed,
            },
        )
    }

    /// Closes any block still open at document end.
    pub fn finish(&self) -> (Automaton, Option<BlockSummary>) {
        let mut next = self.clone();
        let closed = next.close();
        (next, closed)
    }

    fn dispatch_idle(
        &mut self,
        region: &NormalizedRegion,
        protected: bool,
    ) -> (RedactionAction, Option<BlockId>) {
        if region.label == Label::Syllabus {
            return (RedactionAction::Remove, None);
        }
        match PlannerState::opened_by(region.label) {
            Some(state) => {
                let id = self.open(state, region);
                (action_for(region.label, protected), Some(id))
            }
            None => (RedactionAction::Ignore, None),
        }
    }

    fn open(&mut self, state: PlannerState, region: &NormalizedRegion) -> BlockId {
        let id = self.next_block_id;
        self.next_block_id += 1;
        self.state = state;
        self.open_block_id = Some(id);
        self.last_region_geometry = Some(RegionGeometry::of(region));
        self.open_block = Some(BlockSummary {
            block_id: id,
            label: region.label,
            first_page: region.page_index,
            last_page: region.page_index,
            region_count: 1,
        });
        id
    }

    fn extend(&mut self, region: &NormalizedRegion) {
        self.last_region_geometry = Some(RegionGeometry::of(region));
        if let Some(block) = self.open_block.as_mut() {
            block.last_page = region.page_index;
            block.region_count += 1;
        }
    }

    fn close(&mut self) -> Option<BlockSummary> {
        self.state = PlannerState::Idle;
        self.open_block_id = None;
        self.last_region_geometry = None;
        self.open_block.take()
    }
}

fn is_furniture(label: Label) -> bool {
    PlannerState::opened_by(label).is_none() && label != Label::Syllabus
}

fn action_for(label: Label, protected: bool) -> RedactionAction {
    if label == Label::Caption && protected {
        RedactionAction::Mask
    } else {
        RedactionAction::Remove
    }
}

/// Distance from the end of the previous region to the start of `region`,
/// `None` when they are more than one page apart.
///
/// Across a page break the distance is what remains below the previous
/// region on its page plus what lies above `region` on its page, with the
/// configured header and footer bands left out.
fn vertical_gap(
    last: &RegionGeometry,
    region: &NormalizedRegion,
    config: &RedactionConfig,
) -> Option<f32> {
    if region.page_index == last.page_index {
        Some((last.bbox.bottom() - region.bbox.top()).max(0.0))
    } else if region.page_index == last.page_index + 1 {
        let below = last.bbox.bottom() - (last.page_bounds.bottom() + config.bottom_margin_pts);
        let above = (region.page_bounds.top() - config.top_margin_pts) - region.bbox.top();
        Some(below.max(0.0) + above.max(0.0))
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub region: NormalizedRegion,
    pub action: RedactionAction,
    pub continuation_id: Option<BlockId>,
}

/// A caption that starts a new opinion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionMarker {
    pub region_id: usize,
    pub page_index: usize,
    pub confidence: f32,
    pub bbox: Rect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedactionPlan {
    pub actions: Vec<PlannedAction>,
    pub blocks: Vec<BlockSummary>,
    pub captions: Vec<CaptionMarker>,
}

impl RedactionPlan {
    /// Actions that touch the document.
    pub fn active(&self) -> impl Iterator<Item = &PlannedAction> {
        self.actions
            .iter()
            .filter(|a| a.action != RedactionAction::Ignore)
    }

    pub fn count(&self, action: RedactionAction) -> usize {
        self.actions.iter().filter(|a| a.action == action).count()
    }
}

/// Runs the automaton over the whole document.
///
/// Input order does not matter: regions are put into reading order first.
pub fn plan(regions: &[NormalizedRegion], config: &RedactionConfig) -> RedactionPlan {
    let mut ordered = regions.to_vec();
    reading_order(&mut ordered, config.y_tolerance_pts);
    let duplicates = duplicate_detections(&ordered, config.duplicate_overlap);
    let protected = protected_captions(&ordered, config);

    let mut automaton = Automaton::new();
    let mut result = RedactionPlan::default();

    for region in ordered {
        if duplicates.contains(&region.id) {
            log::debug!(
                "[Plan] region {} {} p{} repeats another detection, ignored",
                region.id,
                region.label,
                region.page_index
            );
            result.actions.push(PlannedAction {
                region,
                action: RedactionAction::Ignore,
                continuation_id: None,
            });
            continue;
        }
        if region.label == Label::Caption
            && region.confidence >= config.boundary_confidence_threshold
            && !automaton.continues_block(&region, config)
        {
            result.captions.push(CaptionMarker {
                region_id: region.id,
                page_index: region.page_index,
                confidence: region.confidence,
                bbox: region.bbox,
            });
        }

        let (next, step) = automaton.step(&region, protected.contains(&region.id), config);
        if let Some(closed) = step.closed {
            result.blocks.push(closed);
        }
        log::debug!(
            "[Plan] region {} {} p{} conf {:.2} -> {:?} block {:?}",
            region.id,
            region.label,
            region.page_index,
            region.confidence,
            step.action,
            step.continuation_id
        );
        result.actions.push(PlannedAction {
            region,
            action: step.action,
            continuation_id: step.continuation_id,
        });
        automaton = next;
    }

    if let (_, Some(closed)) = automaton.finish() {
        result.blocks.push(closed);
    }

    log::info!(
        "[Plan] {} regions: {} remove, {} mask, {} ignore, {} blocks, {} captions",
        result.actions.len(),
        result.count(RedactionAction::Remove),
        result.count(RedactionAction::Mask),
        result.count(RedactionAction::Ignore),
        result.blocks.len(),
        result.captions.len()
    );
    result
}

/// Detections repeating a more confident one: same page, same label, and
/// boxes overlapping by more than `threshold` of their union.
fn duplicate_detections(regions: &[NormalizedRegion], threshold: f32) -> HashSet<usize> {
    let mut ranked: Vec<&NormalizedRegion> = regions.iter().collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence).then(a.id.cmp(&b.id)));

    let mut kept: Vec<&NormalizedRegion> = Vec::new();
    let mut duplicates = HashSet::new();
    for region in ranked {
        let repeats = kept.iter().any(|k| {
            k.page_index == region.page_index
                && k.label == region.label
                && k.bbox.iou(&region.bbox) > threshold
        });
        if repeats {
            duplicates.insert(region.id);
        } else {
            kept.push(region);
        }
    }
    duplicates
}

/// Captions that contain a confidently detected OTHER region, which the
/// detector emits for seals and logos inside a caption.
fn protected_captions(regions: &[NormalizedRegion], config: &RedactionConfig) -> HashSet<usize> {
    regions
        .iter()
        .filter(|c| c.label == Label::Caption)
        .filter(|caption| {
            regions.iter().any(|other| {
                other.label == Label::Other
                    && other.page_index == caption.page_index
                    && other.confidence >= config.confidence_threshold
                    && other.bbox.overlap_fraction(&caption.bbox) > config.overlap_fraction
            })
        })
        .map(|c| c.id)
        .collect()
}
