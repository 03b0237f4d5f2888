//! Opinion Boundary Segmenter, pure part: caption markers to page ranges.

use crate::config::RedactionConfig;
use crate::plan::CaptionMarker;
use serde::{Deserialize, Serialize};

/// Inclusive page range of one opinion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionBoundary {
    /// 1-based ordinal.
    pub index: usize,
    pub start_page: usize,
    pub end_page: usize,
    pub title: String,
    /// Region that opened the opinion; `None` for a document without captions.
    pub caption_region: Option<usize>,
    pub caption_excerpt: Option<String>,
}

impl OpinionBoundary {
    pub fn page_count(&self) -> usize {
        self.end_page - self.start_page + 1
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<usize> {
        self.start_page..=self.end_page
    }
}

/// Partitions `0..page_count` into contiguous opinions, one per caption page.
///
/// Pages before the first caption belong to the first opinion, and several
/// captions on one page open a single opinion. Without captions the whole
/// document is one opinion.
pub fn partition(
    page_count: usize,
    captions: &[CaptionMarker],
    config: &RedactionConfig,
) -> Vec<OpinionBoundary> {
    if page_count == 0 {
        return Vec::new();
    }

    let mut starts: Vec<(usize, Option<usize>)> = Vec::new();
    for caption in captions {
        if caption.page_index >= page_count {
            log::warn!(
                "[Split] caption region {} on page {} is outside the document ({} pages)",
                caption.region_id,
                caption.page_index,
                page_count
            );
            continue;
        }
        starts.push((caption.page_index, Some(caption.region_id)));
    }
    starts.sort_by_key(|(page, _)| *page);
    starts.dedup_by_key(|(page, _)| *page);

    if starts.is_empty() {
        log::info!("[Split] no captions detected, treating the document as one opinion");
        starts.push((0, None));
    } else if let Some(first) = starts.first_mut() {
        first.0 = 0;
    }

    let boundaries: Vec<OpinionBoundary> = starts
        .iter()
        .enumerate()
        .map(|(i, &(start_page, caption_region))| {
            let end_page = starts
                .get(i + 1)
                .map(|(next, _)| next - 1)
                .unwrap_or(page_count - 1);
            let index = i + 1;
            OpinionBoundary {
                index,
                start_page,
                end_page,
                title: format!("{:04}-{:02}", start_page + config.first_page_number, index),
                caption_region,
                caption_excerpt: None,
            }
        })
        .collect();

    for b in &boundaries {
        log::info!(
            "[Split] opinion {} ({}): pages {}..={}",
            b.index,
            b.title,
            b.start_page,
            b.end_page
        );
    }
    boundaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use proptest::prelude::*;

    fn caption(region_id: usize, page_index: usize) -> CaptionMarker {
        CaptionMarker {
            region_id,
            page_index,
            confidence: 0.9,
            bbox: Rect::new(72.0, 600.0, 540.0, 700.0),
        }
    }

    fn ranges(boundaries: &[OpinionBoundary]) -> Vec<(usize, usize)> {
        boundaries.iter().map(|b| (b.start_page, b.end_page)).collect()
    }

    #[test]
    fn test_two_opinions() {
        let config = RedactionConfig::default();
        let out = partition(10, &[caption(0, 0), caption(7, 6)], &config);
        assert_eq!(ranges(&out), vec![(0, 5), (6, 9)]);
        assert_eq!(out[0].title, "0001-01");
        assert_eq!(out[1].title, "0007-02");
        assert_eq!(out[1].caption_region, Some(7));
    }

    #[test]
    fn test_leading_pages_join_first_opinion() {
        let config = RedactionConfig::default();
        let out = partition(5, &[caption(3, 2)], &config);
        assert_eq!(ranges(&out), vec![(0, 4)]);
        assert_eq!(out[0].caption_region, Some(3));
    }

    #[test]
    fn test_no_captions_is_one_opinion() {
        let config = RedactionConfig::default();
        let out = partition(3, &[], &config);
        assert_eq!(ranges(&out), vec![(0, 2)]);
        assert_eq!(out[0].caption_region, None);
        assert_eq!(out[0].page_count(), 3);
    }

    #[test]
    fn test_captions_on_one_page_collapse() {
        let config = RedactionConfig::default();
        let out = partition(4, &[caption(1, 2), caption(2, 2), caption(0, 0)], &config);
        assert_eq!(ranges(&out), vec![(0, 1), (2, 3)]);
        assert_eq!(out[1].caption_region, Some(1));
    }

    #[test]
    fn test_out_of_range_caption_is_ignored() {
        let config = RedactionConfig::default();
        let out = partition(2, &[caption(0, 0), caption(1, 9)], &config);
        assert_eq!(ranges(&out), vec![(0, 1)]);
    }

    #[test]
    fn test_empty_document() {
        assert!(partition(0, &[caption(0, 0)], &RedactionConfig::default()).is_empty());
    }

    #[test]
    fn test_title_uses_first_page_number() {
        let config = RedactionConfig {
            first_page_number: 101,
            ..Default::default()
        };
        let out = partition(3, &[caption(0, 0), caption(1, 2)], &config);
        assert_eq!(out[1].title, "0103-02");
    }

    proptest! {
        #[test]
        fn prop_boundaries_cover_every_page_once(
            page_count in 1usize..60,
            pages in prop::collection::vec(0usize..80, 0..20),
        ) {
            let captions: Vec<CaptionMarker> =
                pages.iter().enumerate().map(|(i, &p)| caption(i, p)).collect();
            let out = partition(page_count, &captions, &RedactionConfig::default());

            prop_assert!(!out.is_empty());
            prop_assert_eq!(out[0].start_page, 0);
            prop_assert_eq!(out[out.len() - 1].end_page, page_count - 1);
            for pair in out.windows(2) {
                prop_assert_eq!(pair[0].end_page + 1, pair[1].start_page);
            }
            for (i, b) in out.iter().enumerate() {
                prop_assert_eq!(b.index, i + 1);
                prop_assert!(b.start_page <= b.end_page);
            }
            let total: usize = out.iter().map(|b| b.page_count()).sum();
            prop_assert_eq!(total, page_count);
        }
    }
}
