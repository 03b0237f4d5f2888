//! Pipeline configuration.
//!
//! One immutable [`RedactionConfig`] is built up front and passed by
//! reference through every stage.

use crate::region::Label;
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// RGB color, components in `[0, 1]`.
pub type Rgb = [f32; 3];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Fallback resolution of the detector's page images, used when the
    /// detections file does not declare one.
    pub dpi: f32,
    /// Regions below this confidence are always ignored.
    pub confidence_threshold: f32,
    /// Captions at or above this confidence split opinions, independent of
    /// whether they are confident enough to be redacted.
    pub boundary_confidence_threshold: f32,
    /// Largest vertical distance between two same-label regions that still
    /// continues one block.
    pub gap_threshold_pts: f32,
    /// Running-header band excluded from cross-page gap measurement.
    pub top_margin_pts: f32,
    /// Footer band excluded from cross-page gap measurement.
    pub bottom_margin_pts: f32,
    /// Regions whose tops differ by at most this much are ambiguous in
    /// reading order and are ordered by confidence.
    pub y_tolerance_pts: f32,
    /// A text run is resolved to an action only when strictly more than this
    /// share of its area lies inside the action's rectangle.
    pub overlap_fraction: f32,
    /// Fill used for masks; should match the page background.
    pub mask_color: Rgb,
    /// When set, removed text is additionally covered by a box of this color.
    pub redaction_fill: Option<Rgb>,
    /// Two detections of one label on one page whose boxes overlap by more
    /// than this share of their union are one detection; the less confident
    /// copy is ignored.
    pub duplicate_overlap: f32,
    /// Graphics covering at least this share of the page are page
    /// backgrounds and never masked.
    pub background_area_fraction: f32,
    /// Labels that neither open nor close a block (running headers and
    /// footers between the halves of a block split by a page break).
    pub furniture_labels: Vec<Label>,
    /// Printed number of the first physical page, used in opinion titles.
    pub first_page_number: usize,
    /// Re-extract text from the output and fail on any leak.
    pub verify_output: bool,
    /// Drop XMP metadata and stamp producer information on outputs.
    pub scrub_metadata: bool,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            dpi: 200.0,
            confidence_threshold: 0.20,
            boundary_confidence_threshold: 0.005,
            gap_threshold_pts: 36.0,
            top_margin_pts: 72.0,
            bottom_margin_pts: 0.0,
            y_tolerance_pts: 3.0,
            overlap_fraction: 0.5,
            mask_color: [1.0, 1.0, 1.0],
            redaction_fill: None,
            duplicate_overlap: 0.6,
            background_area_fraction: 0.9,
            furniture_labels: Vec::new(),
            first_page_number: 1,
            verify_output: true,
            scrub_metadata: true,
        }
    }
}

impl RedactionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.dpi > 0.0) {
            return Err(CoreError::InvalidConfig("dpi must be positive"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(CoreError::InvalidConfig(
                "confidence_threshold must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.boundary_confidence_threshold) {
            return Err(CoreError::InvalidConfig(
                "boundary_confidence_threshold must be within [0, 1]",
            ));
        }
        if !(0.0..1.0).contains(&self.overlap_fraction) {
            return Err(CoreError::InvalidConfig(
                "overlap_fraction must be within [0, 1)",
            ));
        }
        if !(self.duplicate_overlap > 0.0 && self.duplicate_overlap <= 1.0) {
            return Err(CoreError::InvalidConfig(
                "duplicate_overlap must be within (0, 1]",
            ));
        }
        if !(self.background_area_fraction > 0.0) {
            return Err(CoreError::InvalidConfig(
                "background_area_fraction must be positive",
            ));
        }
        if self.gap_threshold_pts < 0.0
            || self.top_margin_pts < 0.0
            || self.bottom_margin_pts < 0.0
            || self.y_tolerance_pts < 0.0
        {
            return Err(CoreError::InvalidConfig("distances must not be negative"));
        }
        let colors = std::iter::once(&self.mask_color).chain(self.redaction_fill.iter());
        for color in colors {
            if color.iter().any(|c| !(0.0..=1.0).contains(c)) {
                return Err(CoreError::InvalidConfig(
                    "color components must be within [0, 1]",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RedactionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let config = RedactionConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_dpi() {
        let config = RedactionConfig {
            dpi: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: RedactionConfig =
            serde_json::from_str(r#"{ "gap_threshold_pts": 12.0, "furniture_labels": ["PAGE_FOOTER"] }"#)
                .unwrap();
        assert_eq!(config.gap_threshold_pts, 12.0);
        assert_eq!(config.furniture_labels, vec![Label::PageFooter]);
        assert_eq!(config.dpi, 200.0);
    }
}
