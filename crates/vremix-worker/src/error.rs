//! Worker error types.

use thiserror::Error;
use vremix_media::MediaError;
use vremix_models::SpecError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Media error: {0}")]
    Media(MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn resource_unavailable(msg: impl Into<String>) -> Self {
        Self::ResourceUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The batch was rejected before any job ran.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            WorkerError::Configuration(_) | WorkerError::ResourceUnavailable(_)
        )
    }
}

impl From<SpecError> for WorkerError {
    fn from(err: SpecError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<MediaError> for WorkerError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => {
                Self::ResourceUnavailable(err.to_string())
            }
            MediaError::InvalidCatalog(msg) => Self::Configuration(msg),
            other => Self::Media(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_error_is_configuration() {
        let err: WorkerError = SpecError::InvalidRange {
            field: "zoom",
            min: 5,
            max: 1,
        }
        .into();
        assert!(matches!(err, WorkerError::Configuration(_)));
        assert!(err.is_preflight());
    }

    #[test]
    fn test_missing_engine_is_resource_unavailable() {
        let err: WorkerError = MediaError::FfmpegNotFound.into();
        assert!(matches!(err, WorkerError::ResourceUnavailable(_)));
    }

    #[test]
    fn test_other_media_errors_pass_through() {
        let err: WorkerError = MediaError::ffmpeg_failed("boom", None, Some(1)).into();
        assert!(matches!(err, WorkerError::Media(_)));
        assert!(!err.is_preflight());
    }
}
