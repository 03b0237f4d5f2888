//! The document being redacted.

use crate::inputs::Prefetcher;
use crate::layout::{interpret, PageLayout};
use crate::objects::page_geometry;
use crate::{PdfError, Result};
use blackletter_core::{PageGeometry, Rect};
use lopdf::{Document, ObjectId};
use rayon::prelude::*;
use std::path::Path;

pub struct PdfSource {
    doc: Document,
    page_ids: Vec<ObjectId>,
}

impl PdfSource {
    pub fn load(path: &Path) -> Result<Self> {
        let doc = Document::load(path).map_err(|e| PdfError::Load(e.to_string()))?;
        log::info!("[Load] {} ({} pages)", path.display(), doc.get_pages().len());
        Ok(Self::from_document(doc))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfError::Load(e.to_string()))?;
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: Document) -> Self {
        let page_ids = doc.get_pages().into_values().collect();
        Self { doc, page_ids }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    pub fn page_id(&self, page_index: usize) -> Result<ObjectId> {
        self.page_ids
            .get(page_index)
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                page: page_index,
                count: self.page_ids.len(),
            })
    }

    /// Declared geometry of every page. A page without a usable box gets an
    /// empty rectangle, which the normalizer rejects if a region lands on it.
    pub fn page_geometries(&self) -> Vec<PageGeometry> {
        self.page_ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                page_geometry(&self.doc, *id).unwrap_or_else(|| {
                    log::warn!("[Load] page {} declares no MediaBox", index);
                    PageGeometry::new(Rect::new(0.0, 0.0, 0.0, 0.0), 0)
                })
            })
            .collect()
    }

    /// Text runs and graphics of every page.
    pub fn layouts(&self) -> Vec<PageLayout> {
        let geometries = self.page_geometries();
        let mut prefetcher = Prefetcher::new(&self.doc);
        let inputs: Vec<_> = self
            .page_ids
            .iter()
            .zip(&geometries)
            .enumerate()
            .map(|(index, (id, geometry))| prefetcher.page(index, *id, geometry.bounds))
            .collect();

        let layouts: Vec<PageLayout> = inputs.par_iter().map(interpret).collect();
        log::debug!(
            "[Layout] {} pages, {} runs, {} graphics",
            layouts.len(),
            layouts.iter().map(|l| l.runs.len()).sum::<usize>(),
            layouts.iter().map(|l| l.graphics.len()).sum::<usize>()
        );
        layouts
    }

    /// Rejects documents that cannot be redacted at the content level.
    pub fn ensure_text_layer(&self, layouts: &[PageLayout]) -> Result<()> {
        if self.page_ids.is_empty() {
            return Err(PdfError::EmptyDocument);
        }
        if !layouts.iter().any(PageLayout::has_text) {
            return Err(PdfError::NoExtractableText);
        }
        Ok(())
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| PdfError::Save(e.to_string()))?;
        Ok(buffer)
    }
}
