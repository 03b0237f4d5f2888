//! Annotation scrubbing.
//!
//! Citation markers are often links as well as text; a link left behind
//! over a removed marker still carries its target.

use crate::objects::{rect_from_array, resolve};
use blackletter_core::Rect;
use lopdf::{Document, Object, ObjectId};

/// Removes the annotations of `page_id` whose rectangle lies mostly inside
/// one of `areas`. Returns how many were removed.
pub fn remove_covered(doc: &mut Document, page_id: ObjectId, areas: &[Rect], min_overlap: f32) -> usize {
    if areas.is_empty() {
        return 0;
    }
    let annots: Vec<Object> = match doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|annots| resolve(doc, annots))
    {
        Some(Object::Array(items)) => items.clone(),
        _ => return 0,
    };

    let total = annots.len();
    let mut kept = Vec::with_capacity(total);
    let mut removed: Vec<ObjectId> = Vec::new();
    for item in annots {
        let covered = annotation_rect(doc, &item)
            .map(|rect| areas.iter().any(|area| rect.overlap_fraction(area) > min_overlap))
            .unwrap_or(false);
        if !covered {
            kept.push(item);
            continue;
        }
        log::debug!(
            "[Redact] removing {} annotation on page {:?}",
            subtype(doc, &item),
            page_id
        );
        if let Object::Reference(id) = item {
            removed.push(id);
        }
    }

    let count = total - kept.len();
    if count == 0 {
        return 0;
    }
    if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
        if kept.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", Object::Array(kept));
        }
    }
    for id in &removed {
        doc.objects.remove(id);
    }
    log::info!("[Redact] page {:?}: {} annotations removed", page_id, count);
    count
}

fn annotation_rect(doc: &Document, item: &Object) -> Option<Rect> {
    let dict = resolve(doc, item)?.as_dict().ok()?;
    let rect = resolve(doc, dict.get(b"Rect").ok()?)?.as_array().ok()?;
    rect_from_array(rect)
}

fn subtype(doc: &Document, item: &Object) -> String {
    resolve(doc, item)
        .and_then(|o| o.as_dict().ok())
        .and_then(|d| d.get(b"Subtype").ok())
        .and_then(|s| s.as_name().ok())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_doc, TestPage};

    #[test]
    fn test_only_majority_covered_annotations_go() {
        let mut doc = build_doc(&[TestPage::text(&[(72.0, 700.0, "x")])
            .with_annotation(Rect::new(100.0, 100.0, 120.0, 110.0))
            .with_annotation(Rect::new(100.0, 200.0, 200.0, 210.0))
            .with_annotation(Rect::new(100.0, 300.0, 120.0, 310.0))]);
        let page_id = doc.get_pages()[&1];
        let areas = [
            Rect::new(90.0, 90.0, 130.0, 120.0),
            Rect::new(100.0, 195.0, 130.0, 215.0),
        ];
        assert_eq!(remove_covered(&mut doc, page_id, &areas, 0.5), 1);
        let page = doc.get_dictionary(page_id).unwrap();
        assert_eq!(page.get(b"Annots").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_annots_key_dropped_when_empty() {
        let mut doc = build_doc(&[TestPage::text(&[(72.0, 700.0, "x")])
            .with_annotation(Rect::new(100.0, 100.0, 120.0, 110.0))]);
        let page_id = doc.get_pages()[&1];
        let objects_before = doc.objects.len();
        assert_eq!(
            remove_covered(&mut doc, page_id, &[Rect::new(0.0, 0.0, 612.0, 792.0)], 0.5),
            1
        );
        assert!(doc.get_dictionary(page_id).unwrap().get(b"Annots").is_err());
        assert_eq!(doc.objects.len(), objects_before - 1);
    }

    #[test]
    fn test_page_without_annotations() {
        let mut doc = build_doc(&[TestPage::text(&[(72.0, 700.0, "x")])]);
        let page_id = doc.get_pages()[&1];
        assert_eq!(remove_covered(&mut doc, page_id, &[Rect::new(0.0, 0.0, 1.0, 1.0)], 0.5), 0);
    }
}
