//! Per-opinion output documents.

use crate::{PdfError, Result};
use blackletter_core::OpinionBoundary;
use lopdf::Document;

/// Serializes the pages of `boundary` as a standalone document.
///
/// Works on a copy: every page outside the range is deleted and objects no
/// longer reachable are pruned, so nothing drawn only on other pages
/// survives in the output.
pub fn extract_range(doc: &Document, boundary: &OpinionBoundary) -> Result<Vec<u8>> {
    let page_count = doc.get_pages().len();
    if boundary.end_page >= page_count || boundary.start_page > boundary.end_page {
        return Err(PdfError::PageOutOfRange {
            page: boundary.end_page,
            count: page_count,
        });
    }

    let mut part = doc.clone();
    // Page numbers are 1-based; deleting from the back keeps them stable.
    let doomed: Vec<u32> = (1..=page_count as u32)
        .rev()
        .filter(|n| !boundary.pages().contains(&(*n as usize - 1)))
        .collect();
    for page_number in doomed {
        part.delete_pages(&[page_number]);
    }
    part.prune_objects();
    part.compress();

    let mut buffer = Vec::new();
    part.save_to(&mut buffer)
        .map_err(|e| PdfError::Save(e.to_string()))?;
    log::info!(
        "[Split] opinion {} ({}): pages {}..={}, {} bytes",
        boundary.index,
        boundary.title,
        boundary.start_page,
        boundary.end_page,
        buffer.len()
    );
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PdfSource;
    use crate::testing::{build_doc, TestPage};

    fn boundary(index: usize, start_page: usize, end_page: usize) -> OpinionBoundary {
        OpinionBoundary {
            index,
            start_page,
            end_page,
            title: format!("{:04}-{:02}", start_page + 1, index),
            caption_region: None,
            caption_excerpt: None,
        }
    }

    fn pages(n: usize) -> Document {
        let pages: Vec<TestPage> = (0..n)
            .map(|i| TestPage::text(&[(72.0, 700.0, &format!("Page {}", i + 1))]))
            .collect();
        build_doc(&pages)
    }

    #[test]
    fn test_middle_range() {
        let doc = pages(5);
        let bytes = extract_range(&doc, &boundary(2, 1, 2)).unwrap();
        let part = PdfSource::from_bytes(&bytes).unwrap();
        let texts: Vec<String> = part.layouts().iter().map(|l| l.text()).collect();
        assert_eq!(texts, vec!["Page 2", "Page 3"]);
    }

    #[test]
    fn test_whole_document() {
        let doc = pages(3);
        let bytes = extract_range(&doc, &boundary(1, 0, 2)).unwrap();
        assert_eq!(PdfSource::from_bytes(&bytes).unwrap().page_count(), 3);
    }

    #[test]
    fn test_range_past_end() {
        let doc = pages(2);
        assert!(matches!(
            extract_range(&doc, &boundary(1, 1, 4)),
            Err(PdfError::PageOutOfRange { page: 4, count: 2 })
        ));
    }
}
