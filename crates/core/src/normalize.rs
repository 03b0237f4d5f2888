//! Detection Normalizer: detector pixel space to PDF user space.

use crate::config::RedactionConfig;
use crate::geometry::{PageGeometry, Rect};
use crate::region::{DetectedRegion, NormalizedRegion};
use crate::{CoreError, Result};

/// Maps every detection onto its page in PDF user space and returns the
/// regions in reading order with ids assigned.
///
/// Nothing is filtered here. Boxes sticking out of the rendered image are
/// clamped to the page.
pub fn normalize(
    regions: &[DetectedRegion],
    pages: &[PageGeometry],
    dpi: f32,
    config: &RedactionConfig,
) -> Result<Vec<NormalizedRegion>> {
    let mut normalized = Vec::with_capacity(regions.len());

    for region in regions {
        let page = pages
            .get(region.page_index)
            .ok_or_else(|| CoreError::GeometryMismatch {
                page: region.page_index,
                reason: format!("no declared dimensions ({} pages known)", pages.len()),
            })?;

        if !(page.width() > 0.0) || !(page.height() > 0.0) {
            return Err(CoreError::GeometryMismatch {
                page: region.page_index,
                reason: format!(
                    "declared page size {}x{} is not positive",
                    page.width(),
                    page.height()
                ),
            });
        }
        if !(dpi > 0.0) {
            return Err(CoreError::GeometryMismatch {
                page: region.page_index,
                reason: format!("detector dpi {} is not positive", dpi),
            });
        }

        let bbox = pixel_box_to_user_space(region, page, dpi);
        normalized.push(NormalizedRegion {
            id: 0,
            page_index: region.page_index,
            label: region.label,
            confidence: region.confidence,
            bbox,
            page_bounds: page.bounds,
        });
    }

    reading_order(&mut normalized, config.y_tolerance_pts);
    for (id, region) in normalized.iter_mut().enumerate() {
        region.id = id;
    }

    log::info!(
        "[Normalize] {} regions over {} pages at {} dpi",
        normalized.len(),
        pages.len(),
        dpi
    );
    Ok(normalized)
}

fn pixel_box_to_user_space(region: &DetectedRegion, page: &PageGeometry, dpi: f32) -> Rect {
    let scale = 72.0 / dpi;
    let (display_w, display_h) = page.displayed_size();

    // Relative coordinates against the displayed (rotated) page, top-left origin.
    let rel = |px: f32, extent: f32| (px * scale / extent).clamp(0.0, 1.0);
    let rx0 = rel(region.bbox.x0.min(region.bbox.x1), display_w);
    let rx1 = rel(region.bbox.x0.max(region.bbox.x1), display_w);
    let ry0 = rel(region.bbox.y0.min(region.bbox.y1), display_h);
    let ry1 = rel(region.bbox.y0.max(region.bbox.y1), display_h);

    let b = page.bounds;
    let (w, h) = (page.width(), page.height());

    // /Rotate turns the page clockwise for display; undo it.
    match page.rotation {
        90 => Rect::new(b.x0 + ry0 * w, b.y0 + rx0 * h, b.x0 + ry1 * w, b.y0 + rx1 * h),
        180 => Rect::new(b.x1 - rx1 * w, b.y0 + ry0 * h, b.x1 - rx0 * w, b.y0 + ry1 * h),
        270 => Rect::new(b.x1 - ry1 * w, b.y1 - rx1 * h, b.x1 - ry0 * w, b.y1 - rx0 * h),
        _ => Rect::new(b.x0 + rx0 * w, b.y1 - ry1 * h, b.x0 + rx1 * w, b.y1 - ry0 * h),
    }
}

/// Sorts regions by page, then top to bottom, then left to right.
///
/// Regions on one page whose tops lie within `y_tolerance` of each other
/// (chained) have no reliable vertical order; within such a cluster the more
/// confident region comes first. The result only depends on the input set,
/// so sorting an already sorted list is a no-op.
pub fn reading_order(regions: &mut Vec<NormalizedRegion>, y_tolerance: f32) {
    regions.sort_by(|a, b| {
        a.page_index
            .cmp(&b.page_index)
            .then_with(|| b.bbox.top().total_cmp(&a.bbox.top()))
            .then_with(|| a.bbox.x0.total_cmp(&b.bbox.x0))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.label.as_str().cmp(b.label.as_str()))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut start = 0;
    while start < regions.len() {
        let mut end = start + 1;
        while end < regions.len()
            && regions[end].page_index == regions[start].page_index
            && regions[end - 1].bbox.top() - regions[end].bbox.top() <= y_tolerance
        {
            end += 1;
        }
        if end - start > 1 {
            regions[start..end].sort_by(|a, b| {
                b.confidence
                    .total_cmp(&a.confidence)
                    .then_with(|| b.bbox.top().total_cmp(&a.bbox.top()))
                    .then_with(|| a.bbox.x0.total_cmp(&b.bbox.x0))
                    .then_with(|| a.label.as_str().cmp(b.label.as_str()))
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
        start = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{Label, PixelBox};

    fn letter() -> PageGeometry {
        PageGeometry::new(Rect::new(0.0, 0.0, 612.0, 792.0), 0)
    }

    fn detected(page_index: usize, label: Label, confidence: f32, bbox: [f32; 4]) -> DetectedRegion {
        DetectedRegion {
            page_index,
            label,
            confidence,
            bbox: PixelBox {
                x0: bbox[0],
                y0: bbox[1],
                x1: bbox[2],
                y1: bbox[3],
            },
        }
    }

    fn assert_rect(actual: Rect, expected: Rect) {
        for (a, e) in [
            (actual.x0, expected.x0),
            (actual.y0, expected.y0),
            (actual.x1, expected.x1),
            (actual.y1, expected.y1),
        ] {
            assert!((a - e).abs() < 0.01, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_scales_and_flips_y() {
        // 144 dpi: two pixels per point.
        let regions = vec![detected(0, Label::KeyCite, 0.9, [100.0, 200.0, 300.0, 260.0])];
        let out = normalize(&regions, &[letter()], 144.0, &RedactionConfig::default()).unwrap();
        assert_rect(out[0].bbox, Rect::new(50.0, 662.0, 150.0, 692.0));
        assert_eq!(out[0].page_bounds, letter().bounds);
    }

    #[test]
    fn test_respects_media_box_origin() {
        let page = PageGeometry::new(Rect::new(10.0, 20.0, 622.0, 812.0), 0);
        let regions = vec![detected(0, Label::Caption, 0.9, [0.0, 0.0, 72.0, 72.0])];
        let out = normalize(&regions, &[page], 72.0, &RedactionConfig::default()).unwrap();
        assert_rect(out[0].bbox, Rect::new(10.0, 740.0, 82.0, 812.0));
    }

    #[test]
    fn test_rotated_page_maps_back_to_unrotated_space() {
        // Displayed 792 wide, 612 tall. The displayed top-left corner is the
        // unrotated lower-left corner for a clockwise quarter turn.
        let page = PageGeometry::new(Rect::new(0.0, 0.0, 612.0, 792.0), 90);
        let regions = vec![detected(0, Label::Headnote, 0.9, [0.0, 0.0, 100.0, 50.0])];
        let out = normalize(&regions, &[page], 72.0, &RedactionConfig::default()).unwrap();
        assert_rect(out[0].bbox, Rect::new(0.0, 0.0, 50.0, 100.0));
    }

    #[test]
    fn test_upside_down_page() {
        let page = PageGeometry::new(Rect::new(0.0, 0.0, 612.0, 792.0), 180);
        let regions = vec![detected(0, Label::Headnote, 0.9, [0.0, 0.0, 100.0, 50.0])];
        let out = normalize(&regions, &[page], 72.0, &RedactionConfig::default()).unwrap();
        assert_rect(out[0].bbox, Rect::new(512.0, 0.0, 612.0, 50.0));
    }

    #[test]
    fn test_missing_page_is_geometry_mismatch() {
        let regions = vec![detected(3, Label::Caption, 0.9, [0.0, 0.0, 10.0, 10.0])];
        let err = normalize(&regions, &[letter()], 200.0, &RedactionConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::GeometryMismatch { page: 3, .. }));
    }

    #[test]
    fn test_zero_sized_page_is_geometry_mismatch() {
        let page = PageGeometry::new(Rect::new(0.0, 0.0, 0.0, 792.0), 0);
        let regions = vec![detected(0, Label::Caption, 0.9, [0.0, 0.0, 10.0, 10.0])];
        let err = normalize(&regions, &[page], 200.0, &RedactionConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::GeometryMismatch { page: 0, .. }));
    }

    #[test]
    fn test_low_confidence_is_not_filtered() {
        let regions = vec![detected(0, Label::KeyCite, 0.01, [0.0, 0.0, 10.0, 10.0])];
        let out = normalize(&regions, &[letter()], 200.0, &RedactionConfig::default()).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_output_is_in_reading_order_with_ids() {
        let regions = vec![
            detected(1, Label::OpinionBody, 0.9, [0.0, 100.0, 10.0, 110.0]),
            detected(0, Label::OpinionBody, 0.9, [0.0, 500.0, 10.0, 510.0]),
            detected(0, Label::Caption, 0.9, [0.0, 100.0, 10.0, 110.0]),
        ];
        let out = normalize(&regions, &[letter(), letter()], 72.0, &RedactionConfig::default()).unwrap();
        let order: Vec<(usize, Label)> = out.iter().map(|r| (r.page_index, r.label)).collect();
        assert_eq!(
            order,
            vec![(0, Label::Caption), (0, Label::OpinionBody), (1, Label::OpinionBody)]
        );
        assert_eq!(out.iter().map(|r| r.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_ambiguous_tops_order_by_confidence() {
        let regions = vec![
            detected(0, Label::OpinionBody, 0.4, [0.0, 100.0, 100.0, 150.0]),
            detected(0, Label::KeyCite, 0.95, [300.0, 101.0, 400.0, 150.0]),
        ];
        let out = normalize(&regions, &[letter()], 72.0, &RedactionConfig::default()).unwrap();
        assert_eq!(out[0].label, Label::KeyCite);
        assert_eq!(out[1].label, Label::OpinionBody);
    }
}
