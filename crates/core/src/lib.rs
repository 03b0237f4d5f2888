//! Core data model and planning for legal-opinion redaction.
//!
//! Everything in this crate is document-format agnostic: regions arrive in
//! detector pixel space, are normalized into PDF user space, and are turned
//! into a redaction plan and an opinion partition. Touching the actual PDF
//! is the job of `blackletter-pdf`.

pub mod boundary;
pub mod config;
pub mod geometry;
pub mod normalize;
pub mod plan;
pub mod region;

pub use boundary::{partition, OpinionBoundary};
pub use config::{RedactionConfig, Rgb};
pub use geometry::{PageGeometry, Rect};
pub use normalize::{normalize, reading_order};
pub use plan::{
    plan, Automaton, BlockId, BlockSummary, CaptionMarker, PlannedAction, PlannerState,
    RedactionAction, RedactionPlan, Step,
};
pub use region::{DetectedRegion, Label, NormalizedRegion, PixelBox};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("geometry mismatch on page {page}: {reason}")]
    GeometryMismatch { page: usize, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
