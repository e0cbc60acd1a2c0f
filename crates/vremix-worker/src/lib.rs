//! Batch video remixing.
//!
//! This crate provides:
//! - Pre-splitting inputs into chunks
//! - Environment configuration and component wiring
//! - The sequential batch orchestrator and its event stream
//! - Output naming
//! - Structured logging and metrics

pub mod chunks;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod output;

pub use chunks::split_inputs;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use events::{BatchEvent, BatchSummary};
pub use logging::{init_tracing, JobLogger};
pub use orchestrator::{remove_scratch_dir, BatchHandle, BatchOrchestrator, BatchSettings, CancelFlag};
pub use output::output_path_for;
