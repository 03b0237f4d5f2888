//! Whole-document pipeline: detections in, redacted opinions out.
//!
//! Every stage runs in memory. Outputs are written into a staging directory
//! inside the output directory and moved into place only once all of them
//! exist, so a failing document leaves nothing behind.

use crate::config::ConfigError;
use crate::detections::{DetectionError, DetectionFile};
use crate::report::{sha256_hex, OpinionOutput, PipelineReport, REPORT_FILE};
use blackletter_core::{normalize, partition, plan, CoreError, OpinionBoundary, RedactionConfig};
use blackletter_pdf::{execute, extract_range, resolve, PdfError, PdfSource};
use blackletter_verify::verify_no_leak;
use chrono::Local;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Characters of caption text carried into the opinion record.
const EXCERPT_CHARS: usize = 80;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("detections: {0}")]
    Detections(#[from] DetectionError),
    #[error(transparent)]
    Pdf(#[from] PdfError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("removed text still extractable: {leaks} leaks, {warnings} warnings")]
    LeakDetected { leaks: usize, warnings: usize },
    #[error("report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

pub struct Pipeline {
    config: RedactionConfig,
}

/// Everything a run produces, before anything touches the disk.
struct Outputs {
    redacted: Vec<u8>,
    opinions: Vec<(OpinionBoundary, Vec<u8>)>,
    report: PipelineReport,
}

impl Pipeline {
    pub fn new(config: RedactionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RedactionConfig {
        &self.config
    }

    /// Processes `input` with the detections stored at `detections`.
    pub fn run(&self, input: &Path, detections: &Path, output_dir: &Path) -> Result<PipelineReport> {
        let detections = DetectionFile::load(detections)?;
        self.run_with(input, &detections, output_dir)
    }

    pub fn run_with(
        &self,
        input: &Path,
        detections: &DetectionFile,
        output_dir: &Path,
    ) -> Result<PipelineReport> {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let target = output_dir.join(&stem);

        log::info!("[Pipeline] {} -> {}", input.display(), target.display());
        let bytes = fs::read(input)?;
        let mut outputs = self.process(input, &bytes, detections, &stem)?;
        outputs.report.output_dir = target.clone();
        write_outputs(&outputs, output_dir, &stem, &target)?;

        log::info!(
            "[Pipeline] {}: {} runs removed, {} masks, {} opinions",
            stem,
            outputs.report.execution.runs_removed,
            outputs.report.execution.masks_drawn,
            outputs.report.opinion_count()
        );
        Ok(outputs.report)
    }

    fn process(&self, input: &Path, bytes: &[u8], detections: &DetectionFile, stem: &str) -> Result<Outputs> {
        let config = &self.config;
        let mut source = PdfSource::from_bytes(bytes)?;
        let page_count = source.page_count();
        let layouts = source.layouts();
        source.ensure_text_layer(&layouts)?;

        let dpi = detections.dpi.unwrap_or(config.dpi);
        let regions = normalize(&detections.regions, &source.page_geometries(), dpi, config)?;
        let planned = plan(&regions, config);
        let resolved = resolve(&planned, &layouts, config);

        let excerpts: HashMap<usize, String> = planned
            .captions
            .iter()
            .filter_map(|caption| {
                let layout = layouts.get(caption.page_index)?;
                let text = layout.text_in(&caption.bbox, config.overlap_fraction);
                let excerpt: String = text.chars().take(EXCERPT_CHARS).collect();
                (!excerpt.is_empty()).then_some((caption.region_id, excerpt))
            })
            .collect();

        let execution = execute(&mut source, &layouts, &resolved, config)?;
        let redacted = source.to_bytes()?;

        let verification = if config.verify_output {
            let result = verify_no_leak(&redacted, &execution.removed);
            if !result.ok {
                log::warn!(
                    "[Pipeline] {}: verification failed, nothing written",
                    input.display()
                );
                return Err(PipelineError::LeakDetected {
                    leaks: result.leaks.len(),
                    warnings: result.warnings.len(),
                });
            }
            Some(result)
        } else {
            None
        };

        let mut boundaries = partition(page_count, &planned.captions, config);
        for boundary in &mut boundaries {
            boundary.caption_excerpt = boundary
                .caption_region
                .and_then(|id| excerpts.get(&id).cloned());
        }
        let opinions = boundaries
            .into_iter()
            .map(|boundary| {
                let part = extract_range(source.document(), &boundary)?;
                Ok((boundary, part))
            })
            .collect::<Result<Vec<_>>>()?;

        let report = PipelineReport {
            source: input.to_path_buf(),
            source_sha256: sha256_hex(bytes),
            generated_at: Local::now(),
            page_count,
            dpi,
            unresolved_regions: resolved.unresolved.clone(),
            plan: planned,
            execution,
            verification,
            output_dir: PathBuf::new(),
            redacted_file: PathBuf::from(format!("{}_redacted.pdf", stem)),
            opinions: opinions
                .iter()
                .map(|(boundary, _)| OpinionOutput {
                    boundary: boundary.clone(),
                    file: opinion_file(boundary),
                })
                .collect(),
        };
        Ok(Outputs {
            redacted,
            opinions,
            report,
        })
    }
}

fn opinion_file(boundary: &OpinionBoundary) -> PathBuf {
    Path::new("opinions").join(format!("{}.pdf", boundary.title))
}

/// Writes into a staging directory, then renames it to `target`, replacing
/// any previous output of the same document.
fn write_outputs(outputs: &Outputs, output_dir: &Path, stem: &str, target: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)?;
    let staging = tempfile::Builder::new()
        .prefix(".blackletter-")
        .tempdir_in(output_dir)?;
    let root = staging.path().join(stem);
    fs::create_dir_all(root.join("opinions"))?;

    fs::write(root.join(&outputs.report.redacted_file), &outputs.redacted)?;
    for (boundary, bytes) in &outputs.opinions {
        fs::write(root.join(opinion_file(boundary)), bytes)?;
    }
    fs::write(root.join(REPORT_FILE), outputs.report.to_json()?)?;

    if target.exists() {
        fs::remove_dir_all(target)?;
    }
    fs::rename(&root, target)?;
    log::debug!("[Pipeline] staged outputs moved to {}", target.display());
    Ok(())
}
