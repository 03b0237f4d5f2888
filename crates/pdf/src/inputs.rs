//! Owned per-page inputs for content interpretation.
//!
//! `lopdf::Document` is walked once, sequentially, to collect everything a
//! page's content streams refer to. The result holds no borrows into the
//! document, so pages can then be interpreted in parallel.

use crate::fonts::FontMetrics;
use crate::objects::{
    inherited, matrix_from_operands, page_content, rect_from_array, resolve, resolve_dict,
    stream_content, IDENTITY,
};
use blackletter_core::Rect;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::sync::Arc;

/// Forms nested deeper than this are not interpreted.
const MAX_FORM_DEPTH: usize = 8;

#[derive(Debug, Default)]
pub(crate) struct ResourceSet {
    pub fonts: HashMap<Vec<u8>, Arc<FontMetrics>>,
    pub xobjects: HashMap<Vec<u8>, XObjectInput>,
}

#[derive(Debug, Clone)]
pub(crate) enum XObjectInput {
    Image,
    Form(Arc<FormInput>),
}

#[derive(Debug)]
pub(crate) struct FormInput {
    pub id: ObjectId,
    pub matrix: [f32; 6],
    pub bbox: Option<Rect>,
    pub content: Vec<u8>,
    pub resources: ResourceSet,
    /// The form has no `/Resources` of its own and uses the page's.
    pub inherits_resources: bool,
}

#[derive(Debug)]
pub(crate) struct PageInput {
    pub page_index: usize,
    pub bounds: Rect,
    pub content: Vec<u8>,
    pub resources: ResourceSet,
}

pub(crate) struct Prefetcher<'a> {
    doc: &'a Document,
    fonts: HashMap<ObjectId, Arc<FontMetrics>>,
    forms: HashMap<ObjectId, Arc<FormInput>>,
    /// Forms resolved against the current page's resources.
    page_forms: HashMap<ObjectId, Arc<FormInput>>,
}

impl<'a> Prefetcher<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            fonts: HashMap::new(),
            forms: HashMap::new(),
            page_forms: HashMap::new(),
        }
    }

    pub fn page(&mut self, page_index: usize, page_id: ObjectId, bounds: Rect) -> PageInput {
        let resources = match inherited(self.doc, page_id, b"Resources") {
            Some(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };
        self.page_forms.clear();
        PageInput {
            page_index,
            bounds,
            content: page_content(self.doc, page_id),
            resources: self.resources(&resources, &resources, 0),
        }
    }

    /// Resolves one resource dictionary. `page_resources` is what forms
    /// without their own `/Resources` fall back to.
    fn resources(&mut self, dict: &Dictionary, page_resources: &Dictionary, depth: usize) -> ResourceSet {
        let doc = self.doc;
        let mut set = ResourceSet::default();

        let fonts = dict
            .get(b"Font")
            .ok()
            .and_then(|o| resolve_dict(doc, o));
        if let Some(fonts) = fonts {
            for (name, obj) in fonts.iter() {
                set.fonts.insert(name.clone(), self.font(obj));
            }
        }

        let xobjects = dict
            .get(b"XObject")
            .ok()
            .and_then(|o| resolve_dict(doc, o));
        if let Some(xobjects) = xobjects {
            for (name, obj) in xobjects.iter() {
                if let Some(input) = self.xobject(obj, page_resources, depth) {
                    set.xobjects.insert(name.clone(), input);
                }
            }
        }
        set
    }

    fn font(&mut self, obj: &Object) -> Arc<FontMetrics> {
        let doc = self.doc;
        if let Object::Reference(id) = obj {
            if let Some(cached) = self.fonts.get(id) {
                return Arc::clone(cached);
            }
            let metrics = Arc::new(
                resolve_dict(doc, obj)
                    .map(|dict| FontMetrics::from_dict(doc, dict))
                    .unwrap_or_else(FontMetrics::fallback),
            );
            self.fonts.insert(*id, Arc::clone(&metrics));
            return metrics;
        }
        Arc::new(
            resolve_dict(doc, obj)
                .map(|dict| FontMetrics::from_dict(doc, dict))
                .unwrap_or_else(FontMetrics::fallback),
        )
    }

    fn xobject(&mut self, obj: &Object, page_resources: &Dictionary, depth: usize) -> Option<XObjectInput> {
        let doc = self.doc;
        let id = obj.as_reference().ok()?;
        let Some(Object::Stream(stream)) = resolve(doc, obj) else {
            return None;
        };
        let subtype = stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok());
        match subtype {
            Some(b"Image") => Some(XObjectInput::Image),
            Some(b"Form") => {
                if let Some(cached) = self.forms.get(&id).or_else(|| self.page_forms.get(&id)) {
                    return Some(XObjectInput::Form(Arc::clone(cached)));
                }
                if depth >= MAX_FORM_DEPTH {
                    log::debug!("[Layout] form {:?} nested too deep, skipped", id);
                    return None;
                }
                let own = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve_dict(doc, o))
                    .cloned();
                let inherits_resources = own.is_none();
                let dict = own.unwrap_or_else(|| page_resources.clone());
                let resources = self.resources(&dict, page_resources, depth + 1);
                let form = Arc::new(FormInput {
                    id,
                    matrix: stream
                        .dict
                        .get(b"Matrix")
                        .ok()
                        .and_then(|o| o.as_array().ok())
                        .and_then(|arr| matrix_from_operands(arr))
                        .unwrap_or(IDENTITY),
                    bbox: stream
                        .dict
                        .get(b"BBox")
                        .ok()
                        .and_then(|o| o.as_array().ok())
                        .and_then(|arr| rect_from_array(arr)),
                    content: stream_content(stream),
                    resources,
                    inherits_resources,
                });
                // Forms that borrow page resources resolve differently per page.
                if inherits_resources {
                    self.page_forms.insert(id, Arc::clone(&form));
                } else {
                    self.forms.insert(id, Arc::clone(&form));
                }
                Some(XObjectInput::Form(form))
            }
            _ => None,
        }
    }
}
