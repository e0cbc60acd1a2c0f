//! Filter graph compiler and FFmpeg CLI wrapper.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with bounded diagnostics
//! - FFprobe stream inspection
//! - Per-file parameter sampling and audio tempo decomposition
//! - Filter catalog and overlay anchor tables
//! - Typed filter graph plans and the compiler that builds them
//! - Splitting inputs into fixed-duration chunks

pub mod command;
pub mod error;
pub mod filters;
pub mod graph;
pub mod overlay;
pub mod probe;
pub mod random;
pub mod sampler;
pub mod segment;
pub mod tempo;

pub use command::{
    resolve_binary, DiagnosticTail, FfmpegCommand, FfmpegRunner, Invocation, TranscodeRunner,
};
pub use error::{MediaError, MediaResult};
pub use filters::{ColorAdjustRanges, FilterCatalog, FilterKind};
pub use graph::{
    CompiledJob, FilterGraphCompiler, GraphError, GraphPlan, InputBinding, Label, LabelAllocator,
    Segment, StreamKind,
};
pub use overlay::AnchorTable;
pub use probe::{FfprobeProbe, StreamProbe};
pub use random::{RandomSource, StdRandom};
pub use sampler::ParameterSampler;
pub use segment::split_into_chunks;
pub use vremix_models::display_name;
