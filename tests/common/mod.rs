//! Fixture documents and detections for the pipeline tests.
//!
//! Pages are US Letter, text is Helvetica 12pt, and detections are given at
//! 72 dpi so one detector pixel is one point.

#![allow(dead_code)]

use blackletter::DetectionFile;
use blackletter_core::{DetectedRegion, Label, PixelBox};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat};
use std::path::{Path, PathBuf};

pub const PAGE_HEIGHT: f32 = 792.0;

/// One text line: `(baseline, text)`, drawn at x = 72.
pub type Line = (f32, &'static str);

pub fn build_pdf(pages: &[Vec<Line>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
    )]));

    let mut kids = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (baseline, text) in lines {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Real(*baseline)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ]);
        }
        if lines.is_empty() {
            // Scanned-looking page: a picture frame and no text.
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "re",
                    vec![
                        Object::Integer(36),
                        Object::Integer(36),
                        Object::Integer(540),
                        Object::Integer(720),
                    ],
                ),
                Operation::new("S", vec![]),
                Operation::new("Q", vec![]),
            ]);
        }
        let content = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        kids.push(Object::Reference(doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
        ]))));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(kids.len() as i64)),
            ("Kids", Object::Array(kids)),
            ("Resources", Object::Reference(resources_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// A detection given in PDF coordinates: `top` and `bottom` are y values
/// measured from the bottom of the page.
pub fn region(page_index: usize, label: Label, top: f32, bottom: f32) -> DetectedRegion {
    DetectedRegion {
        page_index,
        label,
        confidence: 0.9,
        bbox: PixelBox {
            x0: 60.0,
            y0: PAGE_HEIGHT - top,
            x1: 560.0,
            y1: PAGE_HEIGHT - bottom,
        },
    }
}

/// Region hugging a line drawn at `baseline`.
pub fn line_region(page_index: usize, label: Label, baseline: f32) -> DetectedRegion {
    region(page_index, label, baseline + 12.0, baseline - 5.0)
}

pub fn detections(regions: Vec<DetectedRegion>) -> DetectionFile {
    DetectionFile {
        dpi: Some(72.0),
        regions,
    }
}

pub fn write_input(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Text of every page of the PDF at `path`.
pub fn page_texts(path: &Path) -> Vec<String> {
    let source = blackletter_pdf::PdfSource::load(path).unwrap();
    source.layouts().iter().map(|l| l.text()).collect()
}
