//! Arena of resources shared between pages.
//!
//! Fonts and forms live in the document's object table and may be referenced
//! from many pages. The arena records who references what so the executor
//! can tell a page-local form from a shared one, and can delete a font once
//! the last page or form using it has dropped it.

use crate::layout::PageLayout;
use crate::objects::{catalog_id, page_resources, resolve, resolve_dict};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    Page(usize),
    Form(ObjectId),
    /// Any other object with resources of its own; never edited.
    Other(ObjectId),
    /// Interactive-form default resources; never edited.
    AcroForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Font,
    Form,
}

#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub id: ObjectId,
    pub kind: ResourceKind,
    pub owners: BTreeSet<Owner>,
    /// Times the resource is drawn across the document; forms only.
    pub draws: usize,
}

#[derive(Debug, Default)]
pub struct ResourceArena {
    entries: Vec<ResourceEntry>,
    index: HashMap<ObjectId, usize>,
    fonts: HashMap<(Owner, Vec<u8>), ObjectId>,
}

impl ResourceArena {
    pub fn build(doc: &Document, page_ids: &[ObjectId], layouts: &[PageLayout]) -> Self {
        let mut arena = Self::default();

        for (page_index, page_id) in page_ids.iter().enumerate() {
            let resources = page_resources(doc, *page_id);
            arena.add_fonts(doc, &resources, Owner::Page(page_index));
        }

        for layout in layouts {
            for form_id in &layout.form_draws {
                let slot = arena.add(*form_id, ResourceKind::Form, Owner::Page(layout.page_index));
                arena.entries[slot].draws += 1;
            }
        }

        // Every other holder of resources owns its fonts too, drawn or not:
        // appearance streams, patterns and Type3 glyphs keep a font alive as
        // much as a page does.
        for (id, object) in &doc.objects {
            let dict = match object {
                Object::Dictionary(dict) => dict,
                Object::Stream(stream) => &stream.dict,
                _ => continue,
            };
            let Some(resources) = dict.get(b"Resources").ok().and_then(|o| resolve_dict(doc, o)) else {
                continue;
            };
            let owner = match (dict.get(b"Type"), dict.get(b"Subtype")) {
                (Ok(Object::Name(kind)), _) if kind == b"Page" || kind == b"Pages" => continue,
                (_, Ok(Object::Name(subtype))) if subtype == b"Form" => Owner::Form(*id),
                _ => Owner::Other(*id),
            };
            arena.add_fonts(doc, resources, owner);
        }

        let acroform = catalog_id(doc)
            .and_then(|id| doc.get_dictionary(id).ok())
            .and_then(|catalog| catalog.get(b"AcroForm").ok())
            .and_then(|o| resolve_dict(doc, o))
            .and_then(|form| form.get(b"DR").ok())
            .and_then(|o| resolve_dict(doc, o));
        if let Some(resources) = acroform {
            arena.add_fonts(doc, resources, Owner::AcroForm);
        }

        log::debug!(
            "[Redact] resource arena: {} entries, {} shared forms",
            arena.entries.len(),
            arena
                .entries
                .iter()
                .filter(|e| e.kind == ResourceKind::Form && e.draws > 1)
                .count()
        );
        arena
    }

    fn add(&mut self, id: ObjectId, kind: ResourceKind, owner: Owner) -> usize {
        let slot = match self.index.get(&id) {
            Some(slot) => *slot,
            None => {
                self.entries.push(ResourceEntry {
                    id,
                    kind,
                    owners: BTreeSet::new(),
                    draws: 0,
                });
                self.index.insert(id, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        self.entries[slot].owners.insert(owner);
        slot
    }

    fn add_fonts(&mut self, doc: &Document, resources: &Dictionary, owner: Owner) {
        let fonts = resources
            .get(b"Font")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok());
        let Some(fonts) = fonts else {
            return;
        };
        for (name, obj) in fonts.iter() {
            if let Object::Reference(id) = obj {
                self.add(*id, ResourceKind::Font, owner);
                self.fonts.insert((owner, name.clone()), *id);
            }
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&ResourceEntry> {
        self.index.get(&id).map(|slot| &self.entries[*slot])
    }

    /// A form drawn more than once cannot be edited for one drawing alone.
    pub fn is_shared(&self, id: ObjectId) -> bool {
        self.get(id).map(|e| e.draws > 1).unwrap_or(false)
    }

    /// Font object `owner`'s resources name `name`.
    pub fn font_of(&self, owner: Owner, name: &[u8]) -> Option<ObjectId> {
        self.fonts.get(&(owner, name.to_vec())).copied()
    }

    /// Removes `owner` from the resource's users; `true` when none remain.
    pub fn release(&mut self, id: ObjectId, owner: Owner) -> bool {
        match self.index.get(&id) {
            Some(slot) => {
                let entry = &mut self.entries[*slot];
                entry.owners.remove(&owner);
                entry.owners.is_empty()
            }
            None => false,
        }
    }
}
