//! Worker configuration.

use std::path::PathBuf;
use std::sync::Arc;

use vremix_media::{AnchorTable, FfmpegRunner, FfprobeProbe, FilterCatalog, FilterGraphCompiler};
use vremix_models::EncodingConfig;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Explicit ffmpeg executable (falls back to PATH)
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe executable (falls back to next to ffmpeg, then PATH)
    pub ffprobe_path: Option<PathBuf>,
    /// JSON filter catalog replacing the built-in one
    pub filter_catalog_path: Option<PathBuf>,
    /// JSON anchor table replacing the built-in one
    pub anchor_table_path: Option<PathBuf>,
    /// Engine diagnostic lines kept per failed job
    pub diagnostic_lines: usize,
    /// Characters of diagnostics carried in a failure event
    pub error_tail_chars: usize,
    /// Output length for looped animated sources, in seconds
    pub loop_secs: f64,
    /// x264 preset
    pub video_preset: String,
    /// x264 CRF
    pub video_crf: u8,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let encoding = EncodingConfig::default();
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            filter_catalog_path: None,
            anchor_table_path: None,
            diagnostic_lines: 15,
            error_tail_chars: 500,
            loop_secs: 10.0,
            video_preset: encoding.preset,
            video_crf: encoding.crf,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup. Unset or unparsable values
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let path = |key: &str| {
            lookup(key)
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
        };

        Self {
            ffmpeg_path: path("VREMIX_FFMPEG"),
            ffprobe_path: path("VREMIX_FFPROBE"),
            filter_catalog_path: path("VREMIX_FILTER_CATALOG"),
            anchor_table_path: path("VREMIX_ANCHOR_TABLE"),
            diagnostic_lines: lookup("VREMIX_DIAGNOSTIC_LINES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.diagnostic_lines),
            error_tail_chars: lookup("VREMIX_ERROR_TAIL_CHARS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.error_tail_chars),
            loop_secs: lookup("VREMIX_LOOP_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|v: &f64| v.is_finite() && *v > 0.0)
                .unwrap_or(defaults.loop_secs),
            video_preset: lookup("VREMIX_VIDEO_PRESET")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.video_preset),
            video_crf: lookup("VREMIX_VIDEO_CRF")
                .and_then(|s| s.parse().ok())
                .filter(|crf| *crf <= 51)
                .unwrap_or(defaults.video_crf),
        }
    }

    /// Encoder settings for every output.
    pub fn encoding(&self) -> EncodingConfig {
        EncodingConfig::default()
            .with_preset(self.video_preset.clone())
            .with_crf(self.video_crf)
    }

    /// Build the graph compiler, loading catalog files if configured.
    pub fn build_compiler(&self) -> WorkerResult<FilterGraphCompiler> {
        let catalog = match &self.filter_catalog_path {
            Some(path) => FilterCatalog::from_json_file(path).map_err(|e| {
                WorkerError::configuration(format!(
                    "filter catalog {}: {}",
                    path.display(),
                    e
                ))
            })?,
            None => FilterCatalog::builtin(),
        };

        let anchors = match &self.anchor_table_path {
            Some(path) => AnchorTable::from_json_file(path).map_err(|e| {
                WorkerError::configuration(format!("anchor table {}: {}", path.display(), e))
            })?,
            None => AnchorTable::builtin(),
        };

        Ok(FilterGraphCompiler::new(catalog, anchors, self.encoding()).with_loop_secs(self.loop_secs))
    }

    /// Engine runner.
    pub fn build_runner(&self) -> Arc<FfmpegRunner> {
        Arc::new(
            FfmpegRunner::new(self.ffmpeg_path.clone()).with_diagnostic_lines(self.diagnostic_lines),
        )
    }

    /// Stream probe.
    pub fn build_probe(&self) -> Arc<FfprobeProbe> {
        Arc::new(FfprobeProbe::new(
            self.ffprobe_path.clone(),
            self.ffmpeg_path.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.diagnostic_lines, 15);
        assert_eq!(config.error_tail_chars, 500);
        assert_eq!(config.loop_secs, 10.0);
        assert_eq!(config.video_preset, "veryfast");
        assert_eq!(config.video_crf, 24);
        assert!(config.ffmpeg_path.is_none());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("VREMIX_FFMPEG", "/opt/ffmpeg/bin/ffmpeg"),
            ("VREMIX_DIAGNOSTIC_LINES", "40"),
            ("VREMIX_LOOP_SECS", "-3"),
            ("VREMIX_VIDEO_CRF", "99"),
            ("VREMIX_VIDEO_PRESET", "slow"),
            ("VREMIX_FFPROBE", " "),
        ]));

        assert_eq!(config.ffmpeg_path, Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")));
        assert!(config.ffprobe_path.is_none());
        assert_eq!(config.diagnostic_lines, 40);
        assert_eq!(config.loop_secs, 10.0);
        assert_eq!(config.video_crf, 24);
        assert_eq!(config.encoding().preset, "slow");
    }

    #[test]
    fn test_missing_catalog_is_configuration_error() {
        let config = WorkerConfig {
            filter_catalog_path: Some(PathBuf::from("/nonexistent/filters.json")),
            ..Default::default()
        };
        assert!(matches!(
            config.build_compiler(),
            Err(WorkerError::Configuration(_))
        ));
    }

    #[test]
    fn test_catalog_file_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filters.json");
        std::fs::write(&path, r#"[{"name": "flip", "expression": "vflip"}]"#).unwrap();

        let config = WorkerConfig {
            filter_catalog_path: Some(path),
            ..Default::default()
        };
        let compiler = tokio_test::assert_ok!(config.build_compiler());
        assert!(compiler.catalog().get("flip").is_some());
    }
}
