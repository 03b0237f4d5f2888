//! Post-redaction verification.
//!
//! Re-reads the rewritten document the same way the pipeline read the
//! source and looks for any removed word still drawn where it used to be.

use blackletter_core::Rect;
use blackletter_pdf::{PdfSource, RemovedText};
use serde::{Deserialize, Serialize};

/// Share of a removed word's box an output run must cover to count as the
/// same place on the page.
const SAME_PLACE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leak {
    pub page_index: usize,
    pub region_id: usize,
    pub text: String,
    pub bbox: Rect,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyResult {
    pub ok: bool,
    pub warnings: Vec<String>,
    pub leaks: Vec<Leak>,
}

/// Checks that none of `expectations` can be extracted from `bytes`.
pub fn verify_no_leak(bytes: &[u8], expectations: &[RemovedText]) -> VerifyResult {
    let mut result = VerifyResult::default();
    let source = match PdfSource::from_bytes(bytes) {
        Ok(source) => source,
        Err(e) => {
            log::warn!("[Verify] output does not load: {}", e);
            result.warnings.push(format!("output does not load: {}", e));
            return result;
        }
    };
    let layouts = source.layouts();

    for expected in expectations {
        let needle = expected.text.trim();
        if needle.is_empty() {
            continue;
        }
        let Some(layout) = layouts.get(expected.page_index) else {
            result.warnings.push(format!(
                "page {} missing from output ({} pages)",
                expected.page_index,
                layouts.len()
            ));
            continue;
        };
        let leaked = layout.runs.iter().any(|run| {
            run.text.contains(needle)
                && (run.bbox.overlap_fraction(&expected.bbox) > SAME_PLACE
                    || expected.bbox.overlap_fraction(&run.bbox) > SAME_PLACE)
        });
        if leaked {
            log::warn!(
                "[Verify] page {}: removed text {:?} of region {} is still drawn",
                expected.page_index,
                needle,
                expected.region_id
            );
            result.leaks.push(Leak {
                page_index: expected.page_index,
                region_id: expected.region_id,
                text: needle.to_string(),
                bbox: expected.bbox,
            });
        }
    }

    result.ok = result.leaks.is_empty() && result.warnings.is_empty();
    log::info!(
        "[Verify] {} removed runs checked, {} leaks, {} warnings",
        expectations.len(),
        result.leaks.len(),
        result.warnings.len()
    );
    result
}
