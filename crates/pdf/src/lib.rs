//! PDF side of the redaction pipeline.
//!
//! Reads page geometry and drawn text out of a document, maps planned
//! regions onto the operators that draw them, rewrites the content so the
//! removed glyphs no longer exist, and cuts the result into per-opinion
//! documents.

pub mod annotations;
pub mod fonts;
mod inputs;
pub mod layout;
pub mod metadata;
pub mod objects;
pub mod redact;
pub mod resolve;
pub mod resources;
mod rewrite;
pub mod source;
pub mod split;

#[cfg(test)]
mod testing;

pub use layout::{GraphicKind, GraphicObject, PageLayout, RunRef, StreamKey, TextRun};
pub use redact::{execute, Degradation, ExecutionReport, RemovedText};
pub use resolve::{resolve, ActionArea, ResolvedPlan, ResolvedSpan, SpanTarget};
pub use source::PdfSource;
pub use split::extract_range;

use blackletter_core::CoreError;

pub type Result<T> = std::result::Result<T, PdfError>;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("failed to load document: {0}")]
    Load(String),
    #[error("failed to save document: {0}")]
    Save(String),
    #[error("document has no pages")]
    EmptyDocument,
    #[error("document has no extractable text layer")]
    NoExtractableText,
    #[error("page {page} out of range ({count} pages)")]
    PageOutOfRange { page: usize, count: usize },
    #[error("malformed content: {0}")]
    Content(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}
