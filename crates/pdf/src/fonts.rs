//! Font metrics and character decoding.
//!
//! Only what text placement needs: glyph advances, code length and a
//! best-effort Unicode mapping. Glyph outlines are never read.

use crate::objects::{get_number, resolve, resolve_dict, stream_content};
use lopdf::{Dictionary, Document, Object};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::collections::HashMap;

/// Advance used when a font declares no width for a code, in glyph units.
const FALLBACK_WIDTH: f32 = 550.0;

static BFCHAR_BLOCK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)beginbfchar(.*?)endbfchar").ok());
static BFRANGE_BLOCK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)beginbfrange(.*?)endbfrange").ok());
static BFCHAR_ENTRY: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").ok());
static BFRANGE_ENTRY: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(<[0-9A-Fa-f]*>|\[[^\]]*\])").ok()
});
static HEX_STRING: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"<([0-9A-Fa-f]*)>").ok());

/// One character code inside a shown string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub code: u32,
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FontMetrics {
    pub base_font: String,
    two_byte: bool,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
    to_unicode: HashMap<u32, String>,
}

impl FontMetrics {
    /// Metrics for a text object whose font could not be found.
    pub fn fallback() -> Self {
        Self {
            base_font: String::from("unknown"),
            default_width: FALLBACK_WIDTH,
            ..Default::default()
        }
    }

    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let name_of = |key: &[u8]| -> String {
            dict.get(key)
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .unwrap_or_default()
        };
        let subtype = name_of(b"Subtype");
        let mut metrics = Self {
            base_font: name_of(b"BaseFont"),
            default_width: FALLBACK_WIDTH,
            ..Default::default()
        };

        if subtype == "Type0" {
            metrics.two_byte = true;
            metrics.default_width = 1000.0;
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve_dict(doc, o));
            if let Some(cid_font) = descendant {
                if let Some(dw) = cid_font.get(b"DW").ok().and_then(get_number) {
                    metrics.default_width = dw;
                }
                if let Some(Object::Array(w)) = cid_font.get(b"W").ok().and_then(|o| resolve(doc, o)) {
                    metrics.cid_widths = parse_cid_widths(doc, w);
                }
            }
        } else {
            metrics.first_char = dict
                .get(b"FirstChar")
                .ok()
                .and_then(get_number)
                .map(|v| v.max(0.0) as u32)
                .unwrap_or(0);
            if let Some(Object::Array(widths)) = dict.get(b"Widths").ok().and_then(|o| resolve(doc, o)) {
                metrics.widths = widths
                    .iter()
                    .map(|w| resolve(doc, w).and_then(get_number).unwrap_or(0.0))
                    .collect();
            }
            let missing = dict
                .get(b"FontDescriptor")
                .ok()
                .and_then(|o| resolve_dict(doc, o))
                .and_then(|fd| fd.get(b"MissingWidth").ok())
                .and_then(get_number);
            if let Some(missing) = missing.filter(|w| *w > 0.0) {
                metrics.default_width = missing;
            } else if let Some(width) = standard_width(&metrics.base_font) {
                metrics.default_width = width;
            }
        }

        if let Some(Object::Stream(cmap)) = dict.get(b"ToUnicode").ok().and_then(|o| resolve(doc, o)) {
            metrics.to_unicode = parse_to_unicode(&stream_content(cmap));
        }
        metrics
    }

    /// Splits a shown string into character codes.
    pub fn glyphs(&self, bytes: &[u8]) -> Vec<Glyph> {
        let step = if self.two_byte { 2 } else { 1 };
        bytes
            .chunks(step)
            .enumerate()
            .map(|(i, chunk)| Glyph {
                code: chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32),
                byte_start: i * step,
                byte_end: i * step + chunk.len(),
            })
            .collect()
    }

    /// Horizontal advance in glyph space units (1/1000 of text space).
    pub fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self.cid_widths.get(&code).copied().unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    /// Word spacing only applies to the single-byte code 32.
    pub fn is_word_space(&self, code: u32) -> bool {
        !self.two_byte && code == 32
    }

    pub fn decode(&self, code: u32) -> String {
        if let Some(mapped) = self.to_unicode.get(&code) {
            return mapped.clone();
        }
        if self.two_byte {
            return char::from_u32(code)
                .filter(|c| !c.is_control())
                .unwrap_or('\u{FFFD}')
                .to_string();
        }
        win_ansi(code as u8).to_string()
    }

    pub fn is_blank(&self, code: u32) -> bool {
        self.decode(code).chars().all(char::is_whitespace)
    }
}

/// Single-byte fallback decoding: Latin-1 plus the common WinAnsi punctuation.
fn win_ansi(byte: u8) -> char {
    match byte {
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0xA7 => '\u{00A7}',
        b => b as char,
    }
}

/// Approximate average advance of the base-14 families that ship no widths.
fn standard_width(base_font: &str) -> Option<f32> {
    let name = base_font.rsplit('+').next().unwrap_or(base_font);
    if name.starts_with("Courier") {
        Some(600.0)
    } else if name.starts_with("Helvetica") || name.starts_with("Arial") {
        Some(556.0)
    } else if name.starts_with("Times") {
        Some(500.0)
    } else {
        None
    }
}

/// Reads a CID font `/W` array: `c [w1 w2 ...]` and `c_first c_last w` forms.
fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(first) = get_number(&w[i]) else {
            i += 1;
            continue;
        };
        let first = first.max(0.0) as u32;
        match w.get(i + 1).and_then(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    if let Some(width) = get_number(width) {
                        widths.insert(first + offset as u32, width);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = get_number(last).map(|v| v.max(0.0) as u32).unwrap_or(first);
                if let Some(width) = w.get(i + 2).and_then(get_number) {
                    // Guard against absurd ranges in broken files.
                    for code in first..=last.min(first.saturating_add(0xFFFF)) {
                        widths.insert(code, width);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn hex_value(hex: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(hex).ok()?;
    if text.is_empty() || text.len() > 8 {
        return None;
    }
    u32::from_str_radix(text, 16).ok()
}

fn utf16_units(hex: &[u8]) -> Vec<u16> {
    hex.chunks(4)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .filter_map(|s| u16::from_str_radix(s, 16).ok())
        .collect()
}

fn utf16_hex(hex: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(hex))
}

/// Parses the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    let (Some(bfchar_block), Some(bfrange_block), Some(bfchar), Some(bfrange), Some(hex_string)) = (
        BFCHAR_BLOCK.as_ref(),
        BFRANGE_BLOCK.as_ref(),
        BFCHAR_ENTRY.as_ref(),
        BFRANGE_ENTRY.as_ref(),
        HEX_STRING.as_ref(),
    ) else {
        return map;
    };

    for block in bfchar_block.captures_iter(data) {
        for entry in bfchar.captures_iter(&block[1]) {
            if let Some(code) = hex_value(&entry[1]) {
                map.insert(code, utf16_hex(&entry[2]));
            }
        }
    }

    for block in bfrange_block.captures_iter(data) {
        for entry in bfrange.captures_iter(&block[1]) {
            let (Some(lo), Some(hi)) = (hex_value(&entry[1]), hex_value(&entry[2])) else {
                continue;
            };
            if hi < lo || hi - lo > 0xFFFF {
                continue;
            }
            let target = &entry[3];
            if target.first() == Some(&b'[') {
                for (offset, item) in hex_string.captures_iter(target).enumerate() {
                    let code = lo + offset as u32;
                    if code > hi {
                        break;
                    }
                    map.insert(code, utf16_hex(&item[1]));
                }
            } else {
                let units = utf16_units(&target[1..target.len() - 1]);
                let Some((last, prefix)) = units.split_last() else {
                    continue;
                };
                for code in lo..=hi {
                    let mut units = prefix.to_vec();
                    units.push(last.wrapping_add((code - lo) as u16));
                    map.insert(code, String::from_utf16_lossy(&units));
                }
            }
        }
    }
    map
}
