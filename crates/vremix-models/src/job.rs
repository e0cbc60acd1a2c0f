//! Per-file job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a single file job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Pending,
    Running,
    Succeeded,
    /// Failed with a reason
    Failed(String),
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed(_))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Zoom and speed drawn once for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedJobParams {
    pub zoom_percent: u32,
    pub speed_percent: u32,
}

impl ResolvedJobParams {
    pub fn new(zoom_percent: u32, speed_percent: u32) -> Self {
        Self {
            zoom_percent,
            speed_percent,
        }
    }

    /// Zoom as a scale factor (`110` -> `1.1`).
    pub fn zoom_factor(&self) -> f64 {
        f64::from(self.zoom_percent) / 100.0
    }

    /// Speed as a playback-rate factor (`150` -> `1.5`).
    pub fn speed_factor(&self) -> f64 {
        f64::from(self.speed_percent) / 100.0
    }
}

impl Default for ResolvedJobParams {
    fn default() -> Self {
        Self::new(crate::NEUTRAL_PERCENT, crate::NEUTRAL_PERCENT)
    }
}

/// One input file's unit of work inside a batch.
///
/// Created when the batch reaches the file and discarded after its terminal
/// event has been emitted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,

    /// Source file
    pub input: PathBuf,

    /// Destination file
    pub output: PathBuf,

    /// Sampled parameters
    pub params: ResolvedJobParams,

    #[serde(default)]
    pub state: JobState,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Finished at timestamp (success or failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a pending job.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, params: ResolvedJobParams) -> Self {
        Self {
            id: JobId::new(),
            input: input.into(),
            output: output.into(),
            params,
            state: JobState::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// File name of the input, for display.
    pub fn file_name(&self) -> String {
        display_name(&self.input)
    }

    /// Start processing the job.
    pub fn start(mut self) -> Self {
        self.state = JobState::Running;
        self.started_at = Some(Utc::now());
        self
    }

    /// Mark job as succeeded.
    pub fn succeed(mut self) -> Self {
        self.state = JobState::Succeeded;
        self.finished_at = Some(Utc::now());
        self
    }

    /// Mark job as failed.
    pub fn fail(mut self, reason: impl Into<String>) -> Self {
        self.state = JobState::Failed(reason.into());
        self.finished_at = Some(Utc::now());
        self
    }

    /// Wall time between start and finish, if both are known.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Final path component as a lossy string, or the whole path if it has none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = Job::new("in/a.mp4", "out/a_processed.mp4", ResolvedJobParams::default());

        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.file_name(), "a.mp4");
        assert!(!job.state.is_terminal());
    }

    #[test]
    fn test_job_state_transitions() {
        let job = Job::new("a.mp4", "b.mp4", ResolvedJobParams::new(110, 90));

        let started = job.start();
        assert_eq!(started.state, JobState::Running);
        assert!(started.started_at.is_some());

        let done = started.succeed();
        assert_eq!(done.state, JobState::Succeeded);
        assert!(done.state.is_terminal());
        assert!(done.elapsed().is_some());
    }

    #[test]
    fn test_job_failure_keeps_reason() {
        let job = Job::new("a.mp4", "b.mp4", ResolvedJobParams::default())
            .start()
            .fail("encoder exploded");

        assert_eq!(job.state, JobState::Failed("encoder exploded".to_string()));
        assert_eq!(job.state.as_str(), "failed");
    }

    #[test]
    fn test_param_factors() {
        let params = ResolvedJobParams::new(125, 50);
        assert!((params.zoom_factor() - 1.25).abs() < f64::EPSILON);
        assert!((params.speed_factor() - 0.5).abs() < f64::EPSILON);
    }
}
