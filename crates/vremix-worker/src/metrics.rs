//! Batch metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder the
//! calls are no-ops.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUCCEEDED_TOTAL: &str = "vremix_jobs_succeeded_total";
    pub const JOBS_FAILED_TOTAL: &str = "vremix_jobs_failed_total";
    pub const BATCHES_TOTAL: &str = "vremix_batches_total";
    pub const FFMPEG_DURATION_SECONDS: &str = "vremix_ffmpeg_duration_seconds";
}

/// Record a successful job.
pub fn record_job_succeeded(format: &str) {
    let labels = [("format", format.to_string())];
    counter!(names::JOBS_SUCCEEDED_TOTAL, &labels).increment(1);
}

/// Record a failed job.
pub fn record_job_failed(format: &str) {
    let labels = [("format", format.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record a finished batch by outcome (`completed`, `cancelled`, `aborted`).
pub fn record_batch(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::BATCHES_TOTAL, &labels).increment(1);
}

/// Record engine wall time for one job.
pub fn record_ffmpeg_duration(duration_secs: f64) {
    histogram!(names::FFMPEG_DURATION_SECONDS).record(duration_secs);
}
