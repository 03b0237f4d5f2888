//! Legal-opinion annotation removal.
//!
//! Takes a text-based opinion PDF plus the regions an external detector
//! found on its rendered pages, deletes the editorial material from the
//! document content, and writes one file per opinion.

pub mod config;
pub mod detections;
pub mod pipeline;
pub mod report;

pub use config::{load_config, save_config, ConfigError};
pub use detections::{DetectionError, DetectionFile};
pub use pipeline::{Pipeline, PipelineError};
pub use report::{OpinionOutput, PipelineReport};

pub use blackletter_core::RedactionConfig;
