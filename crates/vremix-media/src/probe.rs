//! FFprobe stream inspection.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::{resolve_binary, sibling_binary};
use crate::error::{MediaError, MediaResult};

/// Answers questions about an input's streams.
///
/// Implementations never fail: an unreadable file reports no audio.
#[async_trait]
pub trait StreamProbe: Send + Sync {
    /// Whether the file has at least one audio stream.
    async fn has_audio(&self, path: &Path) -> bool;
}

/// Summary of the streams in a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub has_audio: bool,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
}

/// Parse `ffprobe -print_format json -show_streams` output.
pub fn parse_streams(json: &[u8]) -> MediaResult<StreamSummary> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(StreamSummary { has_audio })
}

/// Probe backed by the `ffprobe` executable.
#[derive(Debug, Clone, Default)]
pub struct FfprobeProbe {
    configured: Option<PathBuf>,
    ffmpeg: Option<PathBuf>,
}

impl FfprobeProbe {
    /// `configured` wins; otherwise ffprobe is looked for next to `ffmpeg`, then on PATH.
    pub fn new(configured: Option<PathBuf>, ffmpeg: Option<PathBuf>) -> Self {
        Self { configured, ffmpeg }
    }

    /// Resolve the ffprobe executable.
    pub fn binary(&self) -> MediaResult<PathBuf> {
        if let Some(path) = &self.configured {
            if let Some(found) = resolve_binary(Some(path), "ffprobe") {
                return Ok(found);
            }
        }
        if let Some(sibling) = self.ffmpeg.as_deref().and_then(|f| sibling_binary(f, "ffprobe")) {
            return Ok(sibling);
        }
        resolve_binary(None, "ffprobe").ok_or(MediaError::FfprobeNotFound)
    }

    /// Run ffprobe and summarize the streams.
    pub async fn probe(&self, path: &Path) -> MediaResult<StreamSummary> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let binary = self.binary()?;

        let output = Command::new(&binary)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: "FFprobe failed".to_string(),
                stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            });
        }

        parse_streams(&output.stdout)
    }

    async fn probe_or_default(&self, path: &Path) -> StreamSummary {
        match self.probe(path).await {
            Ok(summary) => summary,
            Err(MediaError::FfprobeNotFound) => {
                warn!(file = %path.display(), "FFprobe not found, assuming no audio");
                StreamSummary::default()
            }
            Err(e) => {
                debug!(file = %path.display(), "Probe failed: {}", e);
                StreamSummary::default()
            }
        }
    }
}

#[async_trait]
impl StreamProbe for FfprobeProbe {
    async fn has_audio(&self, path: &Path) -> bool {
        self.probe_or_default(path).await.has_audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_streams_with_audio() {
        let json = br#"{
            "streams": [
                {"index": 0, "codec_type": "video", "width": 1920, "height": 1080},
                {"index": 1, "codec_type": "audio", "sample_rate": "48000"}
            ]
        }"#;

        let summary = parse_streams(json).unwrap();
        assert!(summary.has_audio);
    }

    #[test]
    fn test_parse_streams_video_only() {
        let json = br#"{"streams": [{"codec_type": "video", "width": 480, "height": 270}]}"#;
        let summary = parse_streams(json).unwrap();
        assert!(!summary.has_audio);
    }

    #[test]
    fn test_parse_streams_empty_and_garbage() {
        assert_eq!(parse_streams(b"{}").unwrap(), StreamSummary::default());
        tokio_test::assert_err!(parse_streams(b"not json"));
    }

    #[tokio::test]
    async fn test_missing_file_degrades() {
        let probe = FfprobeProbe::default();
        let path = Path::new("/nonexistent/vremix/input.mp4");

        assert!(!probe.has_audio(path).await);
    }
}
