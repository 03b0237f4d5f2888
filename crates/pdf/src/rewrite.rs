//! Content-stream surgery.
//!
//! Everything here works on decoded operator lists and owned bytes, so page
//! rewrites can run in parallel and the document is only touched when the
//! results are installed.

use crate::PdfError;
use blackletter_core::{Rect, Rgb};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object};
use std::collections::{BTreeMap, BTreeSet};

/// Property-list keys that carry a text equivalent of marked content.
pub(crate) const REPLACEMENT_TEXT_KEYS: [&[u8]; 3] = [b"ActualText", b"Alt", b"E"];

/// Glyph bytes to delete from one string of a text-showing operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Cut {
    pub element: usize,
    pub byte_start: usize,
    pub byte_end: usize,
    /// `TJ` number standing in for the deleted glyphs.
    pub offset: f32,
}

/// Cuts keyed by operator index.
pub(crate) type Cuts = BTreeMap<usize, Vec<Cut>>;

/// Named property lists of a stream's `/Properties` resources that carry
/// replacement text.
pub(crate) type PropertyLists = BTreeMap<Vec<u8>, Dictionary>;

#[derive(Debug, Clone, Default)]
pub(crate) struct PageEdit {
    pub page_index: usize,
    pub cuts: Cuts,
    pub masks: Vec<Rect>,
    /// Boxes drawn over removed text when a redaction fill is configured.
    pub fills: Vec<Rect>,
    /// Fonts the page's own content selected before the edit.
    pub page_fonts: BTreeSet<Vec<u8>>,
    /// Fonts forms borrow from the page; never dropped.
    pub borrowed_fonts: BTreeSet<Vec<u8>>,
    pub properties: PropertyLists,
}

#[derive(Debug, Clone)]
pub(crate) struct PageRewrite {
    pub page_index: usize,
    pub content: Vec<u8>,
    pub dropped_fonts: BTreeSet<Vec<u8>>,
    pub detached_properties: BTreeSet<Vec<u8>>,
    pub operators_rewritten: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct FormRewrite {
    pub content: Vec<u8>,
    pub dropped_fonts: BTreeSet<Vec<u8>>,
    pub detached_properties: BTreeSet<Vec<u8>>,
    pub operators_rewritten: usize,
}

/// Operator list after cutting.
#[derive(Debug)]
pub(crate) struct Surgery {
    pub operations: Vec<Operation>,
    pub rewritten: usize,
    /// Named property lists that were inlined and are no longer named by
    /// any operator.
    pub detached: BTreeSet<Vec<u8>>,
}

pub(crate) fn decode(content: &[u8]) -> Result<Vec<Operation>, PdfError> {
    Content::decode(content)
        .map(|c| c.operations)
        .map_err(|e| PdfError::Content(e.to_string()))
}

pub(crate) fn encode(operations: Vec<Operation>) -> Result<Vec<u8>, PdfError> {
    Content { operations }
        .encode()
        .map_err(|e| PdfError::Content(e.to_string()))
}

/// Rewrites a page: cuts text, then draws masks above everything else.
pub(crate) fn rewrite_page(
    content: &[u8],
    edit: &PageEdit,
    mask_color: Rgb,
    fill_color: Option<Rgb>,
) -> Result<PageRewrite, PdfError> {
    let Surgery {
        mut operations,
        rewritten,
        detached,
    } = apply_cuts(decode(content)?, &edit.cuts, &edit.properties);
    let dropped_fonts = retire_fonts(&mut operations, &edit.page_fonts, &edit.borrowed_fonts);

    let mut wrapped = Vec::with_capacity(operations.len() + 8 + edit.masks.len() * 2);
    wrapped.push(Operation::new("q", vec![]));
    wrapped.extend(balance(operations));
    wrapped.push(Operation::new("Q", vec![]));
    if let Some(color) = fill_color {
        push_boxes(&mut wrapped, &edit.fills, color);
    }
    push_boxes(&mut wrapped, &edit.masks, mask_color);

    Ok(PageRewrite {
        page_index: edit.page_index,
        content: encode(wrapped)?,
        dropped_fonts,
        detached_properties: detached,
        operators_rewritten: rewritten,
    })
}

/// Rewrites a form's content in place; forms get no masks of their own.
///
/// `own_fonts` are the names in the form's own `/Font` resources; fonts a
/// form borrows from the page are left to the page.
pub(crate) fn rewrite_form(
    content: &[u8],
    cuts: &Cuts,
    own_fonts: &BTreeSet<Vec<u8>>,
    properties: &PropertyLists,
) -> Result<FormRewrite, PdfError> {
    let original = decode(content)?;
    let candidates: BTreeSet<Vec<u8>> = selected_fonts(&original)
        .intersection(own_fonts)
        .cloned()
        .collect();
    let Surgery {
        mut operations,
        rewritten,
        detached,
    } = apply_cuts(original, cuts, properties);
    let dropped_fonts = retire_fonts(&mut operations, &candidates, &BTreeSet::new());
    Ok(FormRewrite {
        content: encode(operations)?,
        dropped_fonts,
        detached_properties: detached,
        operators_rewritten: rewritten,
    })
}

/// Replaces every cut operator with a `TJ` that shows the kept glyphs and
/// moves the pen over the deleted ones. Marked content around a cut loses
/// its replacement text.
pub(crate) fn apply_cuts(operations: Vec<Operation>, cuts: &Cuts, properties: &PropertyLists) -> Surgery {
    let enclosing = marked_content_over(&operations, cuts);
    let mut inlined = BTreeSet::new();
    let mut out = Vec::with_capacity(operations.len());
    let mut rewritten = 0;

    for (index, op) in operations.into_iter().enumerate() {
        if enclosing.contains(&index) {
            out.push(strip_replacement_text(op, properties, &mut inlined));
            continue;
        }
        let Some(op_cuts) = cuts.get(&index) else {
            out.push(op);
            continue;
        };
        rewritten += 1;
        match op.operator.as_str() {
            "Tj" => {
                let pieces = cut_string(op.operands.first(), 0, op_cuts);
                out.push(Operation::new("TJ", vec![Object::Array(pieces)]));
            }
            "'" => {
                let pieces = cut_string(op.operands.first(), 0, op_cuts);
                out.push(Operation::new("T*", vec![]));
                out.push(Operation::new("TJ", vec![Object::Array(pieces)]));
            }
            "\"" => {
                let pieces = cut_string(op.operands.get(2), 0, op_cuts);
                let mut operands = op.operands.into_iter();
                if let (Some(aw), Some(ac)) = (operands.next(), operands.next()) {
                    out.push(Operation::new("Tw", vec![aw]));
                    out.push(Operation::new("Tc", vec![ac]));
                }
                out.push(Operation::new("T*", vec![]));
                out.push(Operation::new("TJ", vec![Object::Array(pieces)]));
            }
            "TJ" => {
                let items = match op.operands.into_iter().next() {
                    Some(Object::Array(items)) => items,
                    _ => Vec::new(),
                };
                let mut array = Vec::with_capacity(items.len() + op_cuts.len() * 2);
                for (element, item) in items.iter().enumerate() {
                    if op_cuts.iter().any(|c| c.element == element) {
                        array.extend(cut_string(Some(item), element, op_cuts));
                    } else {
                        array.push(item.clone());
                    }
                }
                out.push(Operation::new("TJ", vec![Object::Array(array)]));
            }
            _ => {
                rewritten -= 1;
                log::warn!("[Redact] operator {} at {} is not text, cut skipped", op.operator, index);
                out.push(op);
            }
        }
    }

    let still_named = named_properties(&out);
    let detached = inlined
        .into_iter()
        .filter(|name| !still_named.contains(name))
        .collect();
    Surgery {
        operations: out,
        rewritten,
        detached,
    }
}

/// Indices of the marked-content operators whose sequence contains a cut.
fn marked_content_over(operations: &[Operation], cuts: &Cuts) -> BTreeSet<usize> {
    let mut open: Vec<usize> = Vec::new();
    let mut enclosing = BTreeSet::new();
    for (index, op) in operations.iter().enumerate() {
        match op.operator.as_str() {
            "BDC" | "BMC" => open.push(index),
            "EMC" => {
                open.pop();
            }
            _ if cuts.contains_key(&index) => enclosing.extend(open.iter().copied()),
            _ => {}
        }
    }
    enclosing
}

/// Drops `/ActualText`, `/Alt` and `/E` from a `BDC` property list. A named
/// list carrying them is replaced by a stripped inline copy and its name is
/// added to `inlined`.
fn strip_replacement_text(
    mut op: Operation,
    properties: &PropertyLists,
    inlined: &mut BTreeSet<Vec<u8>>,
) -> Operation {
    if op.operator != "BDC" {
        return op;
    }
    let list = match op.operands.get(1) {
        Some(Object::Dictionary(dict)) => Some(dict.clone()),
        Some(Object::Name(name)) => properties.get(name).map(|dict| {
            inlined.insert(name.clone());
            dict.clone()
        }),
        _ => None,
    };
    if let Some(mut dict) = list {
        for key in REPLACEMENT_TEXT_KEYS {
            dict.remove(key);
        }
        // Inline property lists hold direct objects only.
        let indirect: Vec<Vec<u8>> = dict
            .iter()
            .filter(|(_, value)| matches!(value, Object::Reference(_)))
            .map(|(key, _)| key.clone())
            .collect();
        for key in indirect {
            dict.remove(&key);
        }
        op.operands[1] = Object::Dictionary(dict);
    }
    op
}

fn named_properties(operations: &[Operation]) -> BTreeSet<Vec<u8>> {
    operations
        .iter()
        .filter(|op| op.operator == "BDC" || op.operator == "DP")
        .filter_map(|op| match op.operands.get(1) {
            Some(Object::Name(name)) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

fn cut_string(operand: Option<&Object>, element: usize, cuts: &[Cut]) -> Vec<Object> {
    let Some(Object::String(bytes, format)) = operand else {
        return Vec::new();
    };
    let mut ranges: Vec<&Cut> = cuts.iter().filter(|c| c.element == element).collect();
    ranges.sort_by_key(|c| c.byte_start);

    let mut pieces = Vec::new();
    let mut cursor = 0;
    for cut in ranges {
        let start = cut.byte_start.clamp(cursor, bytes.len());
        let end = cut.byte_end.clamp(start, bytes.len());
        if start > cursor {
            pieces.push(Object::String(bytes[cursor..start].to_vec(), *format));
        }
        pieces.push(Object::Real(cut.offset));
        cursor = end;
    }
    if cursor < bytes.len() {
        pieces.push(Object::String(bytes[cursor..].to_vec(), *format));
    }
    pieces
}

/// Font names that still draw at least one glyph.
pub(crate) fn fonts_in_use(operations: &[Operation]) -> BTreeSet<Vec<u8>> {
    let mut used = BTreeSet::new();
    let mut current: Option<Vec<u8>> = None;
    let mut stack: Vec<Option<Vec<u8>>> = Vec::new();

    for op in operations {
        let shows_glyphs = match op.operator.as_str() {
            "q" => {
                stack.push(current.clone());
                false
            }
            "Q" => {
                if let Some(saved) = stack.pop() {
                    current = saved;
                }
                false
            }
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    current = Some(name.clone());
                }
                false
            }
            "Tj" | "'" => matches!(op.operands.first(), Some(Object::String(s, _)) if !s.is_empty()),
            "\"" => matches!(op.operands.get(2), Some(Object::String(s, _)) if !s.is_empty()),
            "TJ" => match op.operands.first() {
                Some(Object::Array(items)) => items
                    .iter()
                    .any(|i| matches!(i, Object::String(s, _) if !s.is_empty())),
                _ => false,
            },
            _ => false,
        };
        if shows_glyphs {
            if let Some(name) = &current {
                used.insert(name.clone());
            }
        }
    }
    used
}

/// Font names selected by any `Tf`.
fn selected_fonts(operations: &[Operation]) -> BTreeSet<Vec<u8>> {
    operations
        .iter()
        .filter(|op| op.operator == "Tf")
        .filter_map(|op| match op.operands.first() {
            Some(Object::Name(name)) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// Fonts of `candidates` outside `keep` that no longer draw a glyph.
///
/// Their `Tf` operators are pointed at a surviving font, so sizes and with
/// them the pen movements of cut runs stay as they were. When nothing in
/// the stream draws any more, those `Tf` operators go instead, together
/// with the text operators left showing nothing.
fn retire_fonts(
    operations: &mut Vec<Operation>,
    candidates: &BTreeSet<Vec<u8>>,
    keep: &BTreeSet<Vec<u8>>,
) -> BTreeSet<Vec<u8>> {
    let in_use = fonts_in_use(operations);
    let unused: BTreeSet<Vec<u8>> = candidates
        .iter()
        .filter(|name| !in_use.contains(*name) && !keep.contains(*name))
        .cloned()
        .collect();
    if unused.is_empty() {
        return unused;
    }
    match in_use.iter().next() {
        Some(survivor) => rename_fonts(operations, &unused, survivor),
        None => operations.retain(|op| !selects_font(op, &unused) && !shows_nothing(op)),
    }
    unused
}

fn selects_font(op: &Operation, names: &BTreeSet<Vec<u8>>) -> bool {
    op.operator == "Tf" && matches!(op.operands.first(), Some(Object::Name(name)) if names.contains(name))
}

fn shows_nothing(op: &Operation) -> bool {
    match op.operator.as_str() {
        "Tj" => matches!(op.operands.first(), Some(Object::String(s, _)) if s.is_empty()),
        "TJ" => match op.operands.first() {
            Some(Object::Array(items)) => !items
                .iter()
                .any(|i| matches!(i, Object::String(s, _) if !s.is_empty())),
            _ => false,
        },
        _ => false,
    }
}

fn rename_fonts(operations: &mut [Operation], from: &BTreeSet<Vec<u8>>, to: &[u8]) {
    for op in operations.iter_mut().filter(|op| op.operator == "Tf") {
        if let Some(Object::Name(name)) = op.operands.first_mut() {
            if from.contains(name) {
                *name = to.to_vec();
            }
        }
    }
}

/// Drops `Q` operators without a matching `q` and closes any left open, so
/// whatever follows the content starts from the default graphics state.
pub(crate) fn balance(operations: Vec<Operation>) -> Vec<Operation> {
    let mut depth = 0usize;
    let mut out = Vec::with_capacity(operations.len());
    for op in operations {
        match op.operator.as_str() {
            "q" => depth += 1,
            "Q" if depth == 0 => continue,
            "Q" => depth -= 1,
            _ => {}
        }
        out.push(op);
    }
    out.extend((0..depth).map(|_| Operation::new("Q", vec![])));
    out
}

fn push_boxes(out: &mut Vec<Operation>, boxes: &[Rect], color: Rgb) {
    if boxes.is_empty() {
        return;
    }
    out.push(Operation::new("q", vec![]));
    out.push(Operation::new(
        "rg",
        color.iter().map(|c| Object::Real(*c)).collect(),
    ));
    for rect in boxes {
        out.push(Operation::new(
            "re",
            vec![
                Object::Real(rect.x0),
                Object::Real(rect.y0),
                Object::Real(rect.width()),
                Object::Real(rect.height()),
            ],
        ));
        out.push(Operation::new("f", vec![]));
    }
    out.push(Operation::new("Q", vec![]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;

    fn literal(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    }

    fn ops(content: &str) -> Vec<Operation> {
        decode(content.as_bytes()).unwrap()
    }

    fn cut(element: usize, byte_start: usize, byte_end: usize, offset: f32) -> Cut {
        Cut {
            element,
            byte_start,
            byte_end,
            offset,
        }
    }

    fn cut_ops(content: &str, cuts: &Cuts) -> Surgery {
        apply_cuts(ops(content), cuts, &PropertyLists::new())
    }

    fn operators(out: &[Operation]) -> Vec<&str> {
        out.iter().map(|o| o.operator.as_str()).collect()
    }

    #[test]
    fn test_tj_becomes_tj_array_with_displacement() {
        let mut cuts = Cuts::new();
        cuts.insert(3, vec![cut(0, 4, 9, -2200.0)]);
        let surgery = cut_ops("BT /F1 12 Tf 72 700 Td (see Smith v. Jones) Tj ET", &cuts);
        assert_eq!(surgery.rewritten, 1);
        assert_eq!(surgery.operations[3].operator, "TJ");
        assert_eq!(
            surgery.operations[3].operands,
            vec![Object::Array(vec![
                literal("see "),
                Object::Real(-2200.0),
                literal(" v. Jones"),
            ])]
        );
    }

    #[test]
    fn test_tj_array_cuts_only_touch_their_element() {
        let mut cuts = Cuts::new();
        cuts.insert(2, vec![cut(2, 0, 3, -1500.0)]);
        let surgery = cut_ops("BT /F1 12 Tf [(keep) -250 (drop) (also)] TJ ET", &cuts);
        assert_eq!(
            surgery.operations[2].operands,
            vec![Object::Array(vec![
                literal("keep"),
                Object::Integer(-250),
                Object::Real(-1500.0),
                literal("p"),
                literal("also"),
            ])]
        );
    }

    #[test]
    fn test_quote_operators_keep_line_and_spacing_effects() {
        let mut cuts = Cuts::new();
        cuts.insert(2, vec![cut(0, 0, 2, -1000.0)]);
        cuts.insert(3, vec![cut(0, 0, 2, -1000.0)]);
        let surgery = cut_ops("BT 14 TL (ab) ' 1 0.5 (cd) \" ET", &cuts);
        assert_eq!(
            operators(&surgery.operations),
            vec!["BT", "TL", "T*", "TJ", "Tw", "Tc", "T*", "TJ", "ET"]
        );
    }

    #[test]
    fn test_inline_actual_text_around_cut_is_stripped() {
        let mut cuts = Cuts::new();
        cuts.insert(4, vec![cut(0, 0, 8, -4800.0)]);
        let content = "/Span <</ActualText (HEADNOTE) /Alt (HEADNOTE) /MCID 3>> BDC \
                       BT /F1 12 Tf 72 700 Td (HEADNOTE) Tj ET EMC \
                       /Span <</ActualText (kept)>> BDC BT (kept) Tj ET EMC";
        let surgery = cut_ops(content, &cuts);

        let Object::Dictionary(props) = &surgery.operations[0].operands[1] else {
            panic!("property list was not kept inline");
        };
        assert!(props.get(b"ActualText").is_err());
        assert!(props.get(b"Alt").is_err());
        assert_eq!(props.get(b"MCID").unwrap(), &Object::Integer(3));

        // Marked content that encloses no cut is left alone.
        let Object::Dictionary(untouched) = &surgery.operations[7].operands[1] else {
            panic!("property list was not kept inline");
        };
        assert!(untouched.get(b"ActualText").is_ok());
        let encoded = encode(surgery.operations).unwrap();
        assert!(!String::from_utf8_lossy(&encoded).contains("HEADNOTE"));
    }

    #[test]
    fn test_named_property_list_is_inlined_without_replacement_text() {
        let mut properties = PropertyLists::new();
        properties.insert(
            b"MC0".to_vec(),
            Dictionary::from_iter(vec![
                ("ActualText", literal("KeyCite Red Flag")),
                ("Lang", literal("en")),
            ]),
        );
        let mut cuts = Cuts::new();
        cuts.insert(4, vec![cut(0, 0, 7, -4200.0)]);
        let content = "/Span /MC0 BDC BT /F1 12 Tf 72 700 Td (KeyCite) Tj ET EMC";
        let surgery = apply_cuts(ops(content), &cuts, &properties);

        let Object::Dictionary(props) = &surgery.operations[0].operands[1] else {
            panic!("named list was not inlined");
        };
        assert!(props.get(b"ActualText").is_err());
        assert_eq!(props.get(b"Lang").unwrap(), &literal("en"));
        assert_eq!(surgery.detached.into_iter().collect::<Vec<_>>(), vec![b"MC0".to_vec()]);
    }

    #[test]
    fn test_property_name_still_used_elsewhere_stays_attached() {
        let mut properties = PropertyLists::new();
        properties.insert(b"MC0".to_vec(), Dictionary::from_iter(vec![("Alt", literal("x"))]));
        let mut cuts = Cuts::new();
        cuts.insert(2, vec![cut(0, 0, 1, -500.0)]);
        let content = "/P /MC0 BDC BT (x) Tj ET EMC /P /MC0 BDC BT (y) Tj ET EMC";
        let surgery = apply_cuts(ops(content), &cuts, &properties);
        assert!(surgery.detached.is_empty());
        assert_eq!(surgery.operations[5].operands[1], Object::Name(b"MC0".to_vec()));
    }

    #[test]
    fn test_balance_drops_stray_and_closes_open() {
        let out = balance(ops("Q q q 1 0 0 1 5 5 cm Q"));
        assert_eq!(operators(&out), vec!["q", "q", "cm", "Q", "Q"]);
    }

    #[test]
    fn test_fonts_in_use_follow_graphics_state() {
        let used = fonts_in_use(&ops("q BT /F2 9 Tf [-500] TJ ET Q BT /F1 12 Tf (x) Tj ET"));
        assert_eq!(used.into_iter().collect::<Vec<_>>(), vec![b"F1".to_vec()]);
    }

    fn edit(cuts: Cuts, page_fonts: &[&[u8]]) -> PageEdit {
        PageEdit {
            page_index: 0,
            cuts,
            masks: vec![Rect::new(10.0, 10.0, 20.0, 30.0)],
            page_fonts: page_fonts.iter().map(|f| f.to_vec()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_page_rewrite_wraps_content_and_drops_fonts() {
        let mut cuts = Cuts::new();
        cuts.insert(3, vec![cut(0, 0, 7, -4200.0)]);
        let content = b"BT /F2 9 Tf 72 720 Td (KeyCite) Tj ET BT /F1 12 Tf 72 700 Td (Opinion) Tj ET q";
        let rewrite = rewrite_page(content, &edit(cuts, &[b"F1", b"F2"]), [1.0, 1.0, 1.0], None).unwrap();
        assert_eq!(rewrite.dropped_fonts.len(), 1);
        assert!(rewrite.dropped_fonts.contains(&b"F2".to_vec()));

        let out = decode(&rewrite.content).unwrap();
        let operators = operators(&out);
        assert_eq!(operators.first(), Some(&"q"));
        assert_eq!(
            &operators[operators.len() - 6..],
            &["Q", "q", "rg", "re", "f", "Q"]
        );
        let text = String::from_utf8_lossy(&rewrite.content);
        assert!(!text.contains("KeyCite"));
        assert!(!text.contains("/F2"));
        assert!(text.contains("Opinion"));
    }

    #[test]
    fn test_emptied_page_loses_its_font_selections() {
        let mut cuts = Cuts::new();
        cuts.insert(3, vec![cut(0, 0, 7, -4200.0)]);
        let content = b"BT /F2 9 Tf 72 720 Td (KeyCite) Tj ET";
        let rewrite = rewrite_page(content, &edit(cuts, &[b"F2"]), [1.0, 1.0, 1.0], None).unwrap();
        assert_eq!(rewrite.dropped_fonts.into_iter().collect::<Vec<_>>(), vec![b"F2".to_vec()]);
        let out = decode(&rewrite.content).unwrap();
        assert!(out.iter().all(|op| op.operator != "Tf" && op.operator != "TJ"));
        assert!(operators(&out).contains(&"Td"));
    }

    #[test]
    fn test_borrowed_font_is_never_dropped() {
        let mut cuts = Cuts::new();
        cuts.insert(3, vec![cut(0, 0, 7, -4200.0)]);
        let content = b"BT /F2 9 Tf 72 720 Td (KeyCite) Tj ET";
        let mut page = edit(cuts, &[b"F2"]);
        page.borrowed_fonts.insert(b"F2".to_vec());
        let rewrite = rewrite_page(content, &page, [1.0, 1.0, 1.0], None).unwrap();
        assert!(rewrite.dropped_fonts.is_empty());
        assert!(String::from_utf8_lossy(&rewrite.content).contains("/F2"));
    }

    #[test]
    fn test_form_drops_only_its_own_fonts() {
        let mut cuts = Cuts::new();
        cuts.insert(3, vec![cut(0, 0, 8, -4800.0)]);
        let content = b"BT /F1 9 Tf 72 40 Td (Reporter) Tj ET";
        let own: BTreeSet<Vec<u8>> = [b"F1".to_vec()].into_iter().collect();
        let rewrite = rewrite_form(content, &cuts, &own, &PropertyLists::new()).unwrap();
        assert_eq!(rewrite.operators_rewritten, 1);
        assert!(rewrite.dropped_fonts.contains(&b"F1".to_vec()));
        assert!(!String::from_utf8_lossy(&rewrite.content).contains("/F1"));

        let borrowed = rewrite_form(content, &cuts, &BTreeSet::new(), &PropertyLists::new()).unwrap();
        assert!(borrowed.dropped_fonts.is_empty());
    }
}
