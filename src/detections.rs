//! Detector output on disk.

use blackletter_core::DetectedRegion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Regions found by the object detector for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFile {
    /// Resolution the pages were rendered at; the configured dpi applies
    /// when absent.
    #[serde(default)]
    pub dpi: Option<f32>,
    #[serde(default)]
    pub regions: Vec<DetectedRegion>,
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("region {index}: confidence {confidence} outside [0, 1]")]
    Confidence { index: usize, confidence: f32 },
}

impl DetectionFile {
    pub fn load(path: &Path) -> Result<Self, DetectionError> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, DetectionError> {
        let file: DetectionFile = serde_json::from_str(raw)?;
        for (index, region) in file.regions.iter().enumerate() {
            if !(0.0..=1.0).contains(&region.confidence) {
                return Err(DetectionError::Confidence {
                    index,
                    confidence: region.confidence,
                });
            }
        }
        log::debug!("[Detections] {} regions", file.regions.len());
        Ok(file)
    }
}
