//! Low-level object access helpers shared by the reader and the rewriter.

use blackletter_core::{PageGeometry, Rect};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Numeric value of an integer or real object.
pub fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Follows a single level of indirection.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Stream bytes with filters applied; unfiltered streams come back as-is.
pub fn stream_content(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Reads a `[llx lly urx ury]` array.
pub fn rect_from_array(arr: &[Object]) -> Option<Rect> {
    let values: Vec<f32> = arr.iter().filter_map(get_number).collect();
    if values.len() == 4 {
        Some(Rect::new(values[0], values[1], values[2], values[3]))
    } else {
        None
    }
}

/// Six-number matrix operand list.
pub fn matrix_from_operands(operands: &[Object]) -> Option<[f32; 6]> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = [0.0; 6];
    for (slot, obj) in m.iter_mut().zip(operands) {
        *slot = get_number(obj)?;
    }
    Some(m)
}

/// Looks up a page attribute, walking up the page tree for inheritable keys.
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // Page trees are shallow; the bound guards against Parent cycles.
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value);
        }
        let parent = current.get(b"Parent").ok()?;
        current = resolve_dict(doc, parent)?;
    }
    None
}

/// Visible box and rotation of a page. CropBox wins over MediaBox, and both
/// may be inherited from the page tree.
pub fn page_geometry(doc: &Document, page_id: ObjectId) -> Option<PageGeometry> {
    let media = match inherited(doc, page_id, b"MediaBox") {
        Some(Object::Array(arr)) => rect_from_array(arr),
        _ => None,
    };
    let crop = match inherited(doc, page_id, b"CropBox") {
        Some(Object::Array(arr)) => rect_from_array(arr),
        _ => None,
    };
    let bounds = match (crop, media) {
        (Some(crop), Some(media)) => crop.intersection(&media).unwrap_or(crop),
        (Some(crop), None) => crop,
        (None, Some(media)) => media,
        (None, None) => return None,
    };
    let rotation = match inherited(doc, page_id, b"Rotate") {
        Some(Object::Integer(r)) => *r as i32,
        _ => 0,
    };
    Some(PageGeometry::new(bounds, rotation))
}

/// Concatenated content of a page; multiple streams are joined with a newline
/// so operators never fuse across the seam.
pub fn page_content(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let Ok(contents) = page.get(b"Contents") else {
        return Vec::new();
    };

    let mut data = Vec::new();
    match resolve(doc, contents) {
        Some(Object::Stream(stream)) => data = stream_content(stream),
        Some(Object::Array(parts)) => {
            for part in parts {
                if let Some(Object::Stream(stream)) = resolve(doc, part) {
                    data.extend(stream_content(stream));
                    data.push(b'\n');
                }
            }
        }
        _ => {}
    }
    data
}

/// Object ids of the page's content streams.
pub fn content_stream_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(parts)) => parts.iter().filter_map(|p| p.as_reference().ok()).collect(),
            _ => vec![*id],
        },
        Ok(Object::Array(parts)) => parts.iter().filter_map(|p| p.as_reference().ok()).collect(),
        _ => Vec::new(),
    }
}

/// Effective resource dictionary of a page, inheritance applied.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

/// Entries of a sub-dictionary of `resources` such as `/Font` or `/XObject`.
pub fn resource_entries<'a>(
    doc: &'a Document,
    resources: &'a Dictionary,
    category: &[u8],
) -> Vec<(&'a [u8], &'a Object)> {
    resources
        .get(category)
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .map(|dict| dict.iter().map(|(k, v)| (k.as_slice(), v)).collect())
        .unwrap_or_default()
}

pub fn catalog_id(doc: &Document) -> Option<ObjectId> {
    doc.trailer.get(b"Root").ok()?.as_reference().ok()
}

pub fn multiply(m: &[f32; 6], n: &[f32; 6]) -> [f32; 6] {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

pub fn apply(m: &[f32; 6], x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

pub const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Bounding box of a rectangle after transformation.
pub fn transform_rect(m: &[f32; 6], rect: &Rect) -> Rect {
    let corners = [
        apply(m, rect.x0, rect.y0),
        apply(m, rect.x1, rect.y0),
        apply(m, rect.x0, rect.y1),
        apply(m, rect.x1, rect.y1),
    ];
    Rect::from_points(&corners).unwrap_or(*rect)
}
