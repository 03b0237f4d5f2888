//! The `plan.json` record written next to every output.

use blackletter_core::{OpinionBoundary, RedactionPlan};
use blackletter_pdf::ExecutionReport;
use blackletter_verify::VerifyResult;
use chrono::{DateTime, Local};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

pub const REPORT_FILE: &str = "plan.json";

#[derive(Debug, Clone, Serialize)]
pub struct OpinionOutput {
    #[serde(flatten)]
    pub boundary: OpinionBoundary,
    /// Relative to the document's output directory.
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub source: PathBuf,
    pub source_sha256: String,
    pub generated_at: DateTime<Local>,
    pub page_count: usize,
    pub dpi: f32,
    pub plan: RedactionPlan,
    /// Active regions that covered no content.
    pub unresolved_regions: Vec<usize>,
    pub execution: ExecutionReport,
    pub verification: Option<VerifyResult>,
    /// Directory holding every output of the document.
    pub output_dir: PathBuf,
    /// Relative to `output_dir`.
    pub redacted_file: PathBuf,
    pub opinions: Vec<OpinionOutput>,
}

impl PipelineReport {
    pub fn opinion_count(&self) -> usize {
        self.opinions.len()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
