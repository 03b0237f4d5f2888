//! Detector regions before and after normalization.

use crate::geometry::Rect;
use serde::{Deserialize, Serialize};

/// Annotation taxonomy emitted by the detector.
///
/// Unknown labels are never an error: they map to [`Label::Other`] and are
/// left untouched by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Label {
    Caption,
    KeyCite,
    Headnote,
    Syllabus,
    CourtHeader,
    PageFooter,
    OpinionBody,
    Other,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Caption => "CAPTION",
            Label::KeyCite => "KEY_CITE",
            Label::Headnote => "HEADNOTE",
            Label::Syllabus => "SYLLABUS",
            Label::CourtHeader => "COURT_HEADER",
            Label::PageFooter => "PAGE_FOOTER",
            Label::OpinionBody => "OPINION_BODY",
            Label::Other => "OTHER",
        }
    }

    /// Parses a detector label. Case, spaces and dashes are ignored, and the
    /// class names used by older detector checkpoints are accepted as aliases.
    pub fn parse(raw: &str) -> Label {
        let key: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "caption" => Label::Caption,
            // Bracketed citator markers and their ordinals are citator
            // material as well.
            "keycite" | "key" | "brackets" | "order" => Label::KeyCite,
            "headnote" | "headnotes" | "headmatter" => Label::Headnote,
            "syllabus" => Label::Syllabus,
            "courtheader" | "header" => Label::CourtHeader,
            "pagefooter" | "footer" | "footnotes" => Label::PageFooter,
            "opinionbody" | "opinion" | "body" => Label::OpinionBody,
            _ => Label::Other,
        }
    }
}

impl From<String> for Label {
    fn from(raw: String) -> Self {
        Label::parse(&raw)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.as_str().to_string()
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Box in detector pixel space: origin top-left, y pointing down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// One detection as produced by the object-detection collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedRegion {
    pub page_index: usize,
    pub label: Label,
    pub confidence: f32,
    pub bbox: PixelBox,
}

/// A detection mapped into PDF user space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRegion {
    /// Position in document reading order, assigned by the normalizer.
    pub id: usize,
    pub page_index: usize,
    pub label: Label,
    pub confidence: f32,
    pub bbox: Rect,
    /// Visible bounds of the page the region sits on.
    pub page_bounds: Rect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_aliases() {
        assert_eq!(Label::parse("KEY_CITE"), Label::KeyCite);
        assert_eq!(Label::parse("Key"), Label::KeyCite);
        assert_eq!(Label::parse("headmatter"), Label::Headnote);
        assert_eq!(Label::parse("court-header"), Label::CourtHeader);
        assert_eq!(Label::parse("Opinion Body"), Label::OpinionBody);
    }

    #[test]
    fn test_citator_marker_classes_are_keycite() {
        assert_eq!(Label::parse("brackets"), Label::KeyCite);
        assert_eq!(Label::parse("order"), Label::KeyCite);
        let label: Label = serde_json::from_str("\"brackets\"").unwrap();
        assert_eq!(label, Label::KeyCite);
    }

    #[test]
    fn test_unknown_label_is_other() {
        assert_eq!(Label::parse("stamp"), Label::Other);
        let label: Label = serde_json::from_str("\"stamp\"").unwrap();
        assert_eq!(label, Label::Other);
    }

    #[test]
    fn test_label_serializes_as_taxonomy_name() {
        assert_eq!(serde_json::to_string(&Label::PageFooter).unwrap(), "\"PAGE_FOOTER\"");
    }
}
