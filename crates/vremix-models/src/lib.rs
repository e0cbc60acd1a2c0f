//! Shared data models for vremix.
//!
//! This crate provides Serde-serializable types for:
//! - Transform specifications and randomized parameters
//! - Output formats and social-platform presets
//! - Encoding configuration
//! - Per-file jobs and their sampled parameters

pub mod encoding;
pub mod format;
pub mod job;
pub mod source;
pub mod transform;

// Re-export common types
pub use encoding::EncodingConfig;
pub use format::{FormatPreset, OutputFormat};
pub use job::{display_name, Job, JobId, JobState, ResolvedJobParams};
pub use source::{is_animated_loop_path, SourceInfo};
pub use transform::{OverlaySpec, ParamSpec, SpecError, TransformSpec, NEUTRAL_PERCENT};
