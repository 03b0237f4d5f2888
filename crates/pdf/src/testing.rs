//! In-memory fixture documents for unit tests.

use blackletter_core::Rect;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub(crate) struct TestPage {
    pub content: Vec<u8>,
    /// Form XObjects by resource name; equal names share one object.
    pub forms: Vec<(String, String)>,
    pub annotations: Vec<Rect>,
}

impl TestPage {
    /// One Helvetica 12pt line per entry, `(x, baseline, text)`.
    pub fn text(lines: &[(f32, f32, &str)]) -> Self {
        Self {
            content: text_content(lines),
            ..Default::default()
        }
    }

    pub fn graphics(content: &str) -> Self {
        Self {
            content: content.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    pub fn with_form(mut self, name: &str, content: &str) -> Self {
        self.forms.push((name.to_string(), content.to_string()));
        self
    }

    pub fn with_annotation(mut self, rect: Rect) -> Self {
        self.annotations.push(rect);
        self
    }

    pub fn append(mut self, content: &str) -> Self {
        self.content.push(b'\n');
        self.content.extend_from_slice(content.as_bytes());
        self
    }
}

pub(crate) fn text_content(lines: &[(f32, f32, &str)]) -> Vec<u8> {
    let mut operations = Vec::new();
    for (x, y, text) in lines {
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
            Operation::new("Td", vec![Object::Real(*x), Object::Real(*y)]),
            Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }
    Content { operations }.encode().unwrap()
}

fn font(doc: &mut Document, base: &str) -> ObjectId {
    doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(base.as_bytes().to_vec())),
    ]))
}

pub(crate) fn build_doc(pages: &[TestPage]) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let helvetica = font(&mut doc, "Helvetica");
    let courier = font(&mut doc, "Courier");
    let mut forms: BTreeMap<String, ObjectId> = BTreeMap::new();

    let mut page_ids = Vec::new();
    for page in pages {
        let mut xobjects = Dictionary::new();
        for (name, content) in &page.forms {
            let id = *forms.entry(name.clone()).or_insert_with(|| {
                let dict = Dictionary::from_iter(vec![
                    ("Type", Object::Name(b"XObject".to_vec())),
                    ("Subtype", Object::Name(b"Form".to_vec())),
                    (
                        "BBox",
                        Object::Array(vec![
                            Object::Integer(0),
                            Object::Integer(0),
                            Object::Integer(612),
                            Object::Integer(792),
                        ]),
                    ),
                    (
                        "Resources",
                        Object::Dictionary(Dictionary::from_iter(vec![(
                            "Font",
                            Object::Dictionary(Dictionary::from_iter(vec![(
                                "F1",
                                Object::Reference(helvetica),
                            )])),
                        )])),
                    ),
                ]);
                doc.add_object(Stream::new(dict, content.as_bytes().to_vec()))
            });
            xobjects.set(name.as_bytes().to_vec(), Object::Reference(id));
        }

        let content_id = doc.add_object(Stream::new(Dictionary::new(), page.content.clone()));
        let resources = Dictionary::from_iter(vec![
            (
                "Font",
                Object::Dictionary(Dictionary::from_iter(vec![
                    ("F1", Object::Reference(helvetica)),
                    ("F2", Object::Reference(courier)),
                ])),
            ),
            ("XObject", Object::Dictionary(xobjects)),
        ]);
        let mut page_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Dictionary(resources)),
        ]);
        if !page.annotations.is_empty() {
            let annots: Vec<Object> = page
                .annotations
                .iter()
                .map(|r| {
                    Object::Reference(doc.add_object(Dictionary::from_iter(vec![
                        ("Type", Object::Name(b"Annot".to_vec())),
                        ("Subtype", Object::Name(b"Link".to_vec())),
                        (
                            "Rect",
                            Object::Array(vec![
                                Object::Real(r.x0),
                                Object::Real(r.y0),
                                Object::Real(r.x1),
                                Object::Real(r.y1),
                            ]),
                        ),
                    ])))
                })
                .collect();
            page_dict.set("Annots", Object::Array(annots));
        }
        page_ids.push(doc.add_object(page_dict));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(page_ids.len() as i64)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}

pub(crate) fn build_pdf(pages: &[TestPage]) -> Vec<u8> {
    let mut doc = build_doc(pages);
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
