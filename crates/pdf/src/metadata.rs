//! Document-level metadata scrubbing.

use crate::objects::catalog_id;
use chrono::Local;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use serde::Serialize;

const PRODUCER: &str = concat!("blackletter ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScrubResult {
    pub xmp_streams_removed: usize,
    pub producer: String,
    pub mod_date: String,
}

/// Drops XMP metadata from the catalog and the pages, then stamps the
/// producer and modification date into the Info dictionary.
pub fn scrub(doc: &mut Document) -> ScrubResult {
    let mut result = ScrubResult {
        xmp_streams_removed: remove_xmp(doc),
        ..Default::default()
    };
    let (producer, mod_date) = stamp(doc);
    result.producer = producer;
    result.mod_date = mod_date;
    log::info!(
        "[Redact] metadata: {} XMP streams removed, Producer={}, ModDate={}",
        result.xmp_streams_removed,
        result.producer,
        result.mod_date
    );
    result
}

fn remove_xmp(doc: &mut Document) -> usize {
    let mut holders: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if let Some(catalog) = catalog_id(doc) {
        holders.push(catalog);
    }

    let mut removed = 0;
    for holder in holders {
        let metadata = match doc.get_object_mut(holder) {
            Ok(Object::Dictionary(dict)) => dict.remove(b"Metadata"),
            _ => None,
        };
        match metadata {
            Some(Object::Reference(id)) => {
                doc.objects.remove(&id);
                removed += 1;
            }
            Some(_) => removed += 1,
            None => {}
        }
    }
    removed
}

/// PDF date string for the current local time, e.g. `D:20240131120000+01'00'`.
pub fn pdf_date() -> String {
    let now = Local::now();
    let offset = now.format("%:z").to_string().replace(':', "'");
    format!("D:{}{}'", now.format("%Y%m%d%H%M%S"), offset)
}

fn stamp(doc: &mut Document) -> (String, String) {
    let mod_date = pdf_date();
    let entries = [
        ("Producer", PRODUCER.to_string()),
        ("ModDate", mod_date.clone()),
    ];

    let info_id = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) if doc.get_dictionary(*id).is_ok() => Some(*id),
        _ => None,
    };
    let info = match info_id {
        Some(id) => match doc.get_object_mut(id) {
            Ok(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        },
        None => match doc.trailer.get_mut(b"Info") {
            Ok(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        },
    };

    match info {
        Some(dict) => set_entries(dict, &entries),
        None => {
            let mut dict = Dictionary::new();
            set_entries(&mut dict, &entries);
            let id = doc.add_object(Object::Dictionary(dict));
            doc.trailer.set("Info", Object::Reference(id));
        }
    }
    (PRODUCER.to_string(), mod_date)
}

fn set_entries(dict: &mut Dictionary, entries: &[(&str, String)]) {
    for (key, value) in entries {
        dict.set(
            *key,
            Object::String(value.as_bytes().to_vec(), StringFormat::Literal),
        );
    }
}
