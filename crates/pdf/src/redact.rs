//! Redaction Executor.
//!
//! Deletes the glyphs of every Remove span from the content that draws them
//! and paints opaque masks over Mask spans. Pages are independent: their
//! content is fetched up front, rewritten in parallel and installed back in
//! one sequential pass.

use crate::annotations::remove_covered;
use crate::layout::{clip, PageLayout, RunRef, StreamKey};
use crate::metadata;
use crate::objects::{page_content, page_resources, resolve_dict, resource_entries, stream_content};
use crate::resolve::{ResolvedPlan, ResolvedSpan, SpanTarget};
use crate::resources::{Owner, ResourceArena};
use crate::rewrite::{
    rewrite_form, rewrite_page, Cut, Cuts, FormRewrite, PageEdit, PageRewrite, PropertyLists,
    REPLACEMENT_TEXT_KEYS,
};
use crate::source::PdfSource;
use crate::{PdfError, Result};
use blackletter_core::{Rect, RedactionAction, RedactionConfig};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A Remove span that could only be masked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degradation {
    pub page_index: usize,
    pub region_id: usize,
    pub reason: String,
}

/// Text deleted from the document, kept so the output can be checked for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovedText {
    pub page_index: usize,
    pub region_id: usize,
    pub text: String,
    pub bbox: Rect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub pages_rewritten: usize,
    pub forms_rewritten: usize,
    pub runs_removed: usize,
    pub masks_drawn: usize,
    pub fonts_dropped: usize,
    /// Font objects deleted because no page or form uses them any more.
    pub font_objects_deleted: usize,
    pub annotations_removed: usize,
    pub degradations: Vec<Degradation>,
    #[serde(skip)]
    pub removed: Vec<RemovedText>,
}

/// Applies `resolved` to the document held by `source`.
///
/// `layouts` must be the layouts `resolved` was computed from; span
/// addresses refer to their operator indices.
pub fn execute(
    source: &mut PdfSource,
    layouts: &[PageLayout],
    resolved: &ResolvedPlan,
    config: &RedactionConfig,
) -> Result<ExecutionReport> {
    let page_ids = source.page_ids().to_vec();
    let mut arena = ResourceArena::build(source.document(), &page_ids, layouts);
    let mut report = ExecutionReport::default();

    let mut edits: BTreeMap<usize, PageEdit> = BTreeMap::new();
    let mut form_cuts: BTreeMap<ObjectId, Cuts> = BTreeMap::new();

    for span in &resolved.spans {
        let Some(layout) = layouts.get(span.page_index) else {
            return Err(PdfError::PageOutOfRange {
                page: span.page_index,
                count: layouts.len(),
            });
        };
        let edit = edits.entry(span.page_index).or_insert_with(|| PageEdit {
            page_index: span.page_index,
            page_fonts: layout.page_fonts.clone(),
            borrowed_fonts: layout.borrowed_fonts.clone(),
            ..Default::default()
        });

        match &span.target {
            SpanTarget::Text(reference) => {
                let Some(cut) = cut_for(layout, reference) else {
                    degrade(&mut report, edit, span, layout, "run no longer matches the content");
                    continue;
                };
                match reference.stream {
                    StreamKey::Form(form_id) if arena.is_shared(form_id) => {
                        degrade(&mut report, edit, span, layout, "text lives in a shared form");
                        continue;
                    }
                    StreamKey::Form(form_id) => form_cuts
                        .entry(form_id)
                        .or_default()
                        .entry(reference.op_index)
                        .or_default()
                        .push(cut),
                    StreamKey::Page(_) => edit.cuts.entry(reference.op_index).or_default().push(cut),
                }
                if config.redaction_fill.is_some() {
                    edit.fills.push(clip(&span.unit_bbox, &layout.bounds));
                }
                report.runs_removed += 1;
                report.removed.push(RemovedText {
                    page_index: span.page_index,
                    region_id: span.region_id,
                    text: span.text.clone().unwrap_or_default(),
                    bbox: span.unit_bbox,
                });
            }
            SpanTarget::Graphic { .. } | SpanTarget::Area => edit.masks.push(span.rect),
        }
    }

    for (form_id, cuts) in &form_cuts {
        let rewrite = rewrite_form_in_place(source.document_mut(), *form_id, cuts)?;
        release_fonts(
            source.document_mut(),
            &mut arena,
            Owner::Form(*form_id),
            &rewrite.dropped_fonts,
            &mut report,
        );
        report.forms_rewritten += 1;
    }

    let doc = source.document();
    let jobs: Vec<(PageEdit, Vec<u8>)> = edits
        .into_values()
        .filter(|e| !e.cuts.is_empty() || !e.masks.is_empty() || !e.fills.is_empty())
        .map(|mut e| {
            let page_id = page_ids[e.page_index];
            e.properties = replacement_text_properties(doc, &page_resources(doc, page_id));
            let content = page_content(doc, page_id);
            (e, content)
        })
        .collect();
    let rewrites: Vec<PageRewrite> = jobs
        .par_iter()
        .map(|(edit, content)| rewrite_page(content, edit, config.mask_color, config.redaction_fill))
        .collect::<Result<_>>()?;

    for ((edit, _), rewrite) in jobs.iter().zip(&rewrites) {
        let page_id = page_ids[rewrite.page_index];
        let doc = source.document_mut();
        install_content(doc, page_id, rewrite.content.clone())?;
        if !rewrite.dropped_fonts.is_empty() || !rewrite.detached_properties.is_empty() {
            let resources = without_entries(doc, page_resources(doc, page_id), b"Font", &rewrite.dropped_fonts);
            let resources = without_entries(doc, resources, b"Properties", &rewrite.detached_properties);
            if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
                page.set("Resources", Object::Dictionary(resources));
            }
            release_fonts(
                doc,
                &mut arena,
                Owner::Page(rewrite.page_index),
                &rewrite.dropped_fonts,
                &mut report,
            );
        }
        report.pages_rewritten += 1;
        report.masks_drawn += edit.masks.len();
        log::info!(
            "[Redact] page {}: {} operators rewritten, {} masks, {} fonts dropped, {} property lists detached",
            rewrite.page_index,
            rewrite.operators_rewritten,
            edit.masks.len(),
            rewrite.dropped_fonts.len(),
            rewrite.detached_properties.len()
        );
    }

    let mut remove_areas: BTreeMap<usize, Vec<Rect>> = BTreeMap::new();
    for area in resolved.areas.iter().filter(|a| a.action == RedactionAction::Remove) {
        remove_areas.entry(area.page_index).or_default().push(area.rect);
    }
    for (page_index, areas) in remove_areas {
        if let Some(page_id) = page_ids.get(page_index) {
            report.annotations_removed +=
                remove_covered(source.document_mut(), *page_id, &areas, config.overlap_fraction);
        }
    }

    if config.scrub_metadata {
        metadata::scrub(source.document_mut());
    }
    let pruned = source.document_mut().prune_objects();

    log::info!(
        "[Redact] {} runs removed, {} masks on {} pages, {} forms rewritten, {} degradations, {} objects pruned",
        report.runs_removed,
        report.masks_drawn,
        report.pages_rewritten,
        report.forms_rewritten,
        report.degradations.len(),
        pruned.len()
    );
    Ok(report)
}

fn cut_for(layout: &PageLayout, reference: &RunRef) -> Option<Cut> {
    layout
        .runs
        .iter()
        .find(|run| run.reference == *reference)
        .map(|run| Cut {
            element: reference.element,
            byte_start: reference.byte_start,
            byte_end: reference.byte_end,
            offset: run.removal_offset,
        })
}

fn degrade(
    report: &mut ExecutionReport,
    edit: &mut PageEdit,
    span: &ResolvedSpan,
    layout: &PageLayout,
    reason: &str,
) {
    log::warn!(
        "[Redact] page {}: region {} masked instead of removed, {}",
        span.page_index,
        span.region_id,
        reason
    );
    edit.masks.push(clip(&span.unit_bbox, &layout.bounds));
    report.degradations.push(Degradation {
        page_index: span.page_index,
        region_id: span.region_id,
        reason: reason.to_string(),
    });
}

fn rewrite_form_in_place(doc: &mut Document, form_id: ObjectId, cuts: &Cuts) -> Result<FormRewrite> {
    let (content, resources) = match doc.get_object(form_id) {
        Ok(Object::Stream(stream)) => (
            stream_content(stream),
            stream
                .dict
                .get(b"Resources")
                .ok()
                .and_then(|o| resolve_dict(doc, o))
                .cloned(),
        ),
        _ => return Err(PdfError::Content(format!("form {:?} is not a stream", form_id))),
    };
    let own_fonts: BTreeSet<Vec<u8>> = resources
        .as_ref()
        .map(|res| {
            resource_entries(doc, res, b"Font")
                .into_iter()
                .map(|(name, _)| name.to_vec())
                .collect()
        })
        .unwrap_or_default();
    let properties = resources
        .as_ref()
        .map(|res| replacement_text_properties(doc, res))
        .unwrap_or_default();

    let rewrite = rewrite_form(&content, cuts, &own_fonts, &properties)?;
    // A form without resources of its own draws with the page's, which the
    // page rewrite takes care of.
    let resources = resources.map(|res| {
        let res = without_entries(doc, res, b"Font", &rewrite.dropped_fonts);
        without_entries(doc, res, b"Properties", &rewrite.detached_properties)
    });
    if let Ok(Object::Stream(stream)) = doc.get_object_mut(form_id) {
        stream.dict.remove(b"Filter");
        stream.dict.remove(b"DecodeParms");
        stream.set_content(rewrite.content.clone());
        if let Some(resources) = resources {
            stream.dict.set("Resources", Object::Dictionary(resources));
        }
    }
    log::info!(
        "[Redact] form {:?}: {} operators rewritten, {} fonts dropped",
        form_id,
        rewrite.operators_rewritten,
        rewrite.dropped_fonts.len()
    );
    Ok(rewrite)
}

/// Named property lists of `resources` that carry replacement text.
fn replacement_text_properties(doc: &Document, resources: &Dictionary) -> PropertyLists {
    resource_entries(doc, resources, b"Properties")
        .into_iter()
        .filter_map(|(name, obj)| {
            let dict = resolve_dict(doc, obj)?;
            REPLACEMENT_TEXT_KEYS
                .iter()
                .any(|key| dict.has(key))
                .then(|| (name.to_vec(), dict.clone()))
        })
        .collect()
}

/// Copy of `resources` with `names` removed from its `category` table; an
/// emptied table is removed as well. The copy is installed on the owner so
/// pages and forms sharing the original are unaffected.
fn without_entries(
    doc: &Document,
    mut resources: Dictionary,
    category: &[u8],
    names: &BTreeSet<Vec<u8>>,
) -> Dictionary {
    if names.is_empty() {
        return resources;
    }
    let mut table = resources
        .get(category)
        .ok()
        .and_then(|o| resolve_dict(doc, o))
        .cloned()
        .unwrap_or_default();
    for name in names {
        table.remove(name);
    }
    if table.is_empty() {
        resources.remove(category);
    } else {
        resources.set(category.to_vec(), Object::Dictionary(table));
    }
    resources
}

/// Releases `owner`'s claim on the fonts it dropped; a font left without
/// owners is deleted.
fn release_fonts(
    doc: &mut Document,
    arena: &mut ResourceArena,
    owner: Owner,
    dropped: &BTreeSet<Vec<u8>>,
    report: &mut ExecutionReport,
) {
    report.fonts_dropped += dropped.len();
    for name in dropped {
        let Some(font_id) = arena.font_of(owner, name) else {
            continue;
        };
        if arena.release(font_id, owner) {
            delete_font(doc, font_id);
            report.font_objects_deleted += 1;
        }
    }
}

/// Deletes a font object along with the entries stale resource tables still
/// hold for it.
fn delete_font(doc: &mut Document, font_id: ObjectId) {
    doc.objects.remove(&font_id);
    let mut stale_entries = 0;
    for object in doc.objects.values_mut() {
        let dict = match object {
            Object::Dictionary(dict) => dict,
            Object::Stream(stream) => &mut stream.dict,
            _ => continue,
        };
        stale_entries += purge_references(dict, font_id);
    }
    log::debug!(
        "[Redact] font {:?} has no users left, deleted with {} stale entries",
        font_id,
        stale_entries
    );
}

fn purge_references(dict: &mut Dictionary, target: ObjectId) -> usize {
    let keys: Vec<Vec<u8>> = dict.iter().map(|(key, _)| key.clone()).collect();
    let mut purged = 0;
    for key in keys {
        if matches!(dict.get(&key), Ok(Object::Reference(id)) if *id == target) {
            dict.remove(&key);
            purged += 1;
        } else if let Ok(Object::Dictionary(inner)) = dict.get_mut(&key) {
            purged += purge_references(inner, target);
        }
    }
    purged
}

/// Points the page at a single new content stream. The old streams become
/// unreferenced and are pruned before saving.
fn install_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
    match doc.get_object_mut(page_id) {
        Ok(Object::Dictionary(page)) => {
            page.set("Contents", Object::Reference(content_id));
            Ok(())
        }
        _ => Err(PdfError::Content(format!("page {:?} is not a dictionary", page_id))),
    }
}
