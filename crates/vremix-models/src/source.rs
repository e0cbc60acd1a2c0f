//! Per-job facts about an input file, gathered before compilation.

use std::path::{Path, PathBuf};

/// Extensions treated as animated loops (no audio, looped to a fixed length).
pub const ANIMATED_LOOP_EXTENSIONS: &[&str] = &["gif"];

/// Whether `path` names an animated-loop source, judged by extension.
pub fn is_animated_loop_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_lowercase();
            ANIMATED_LOOP_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Input to the graph compiler describing one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub path: PathBuf,
    /// The source carries a real audio stream
    pub has_audio: bool,
    /// The source is an animated image that must be looped
    pub is_animated_loop: bool,
}

impl SourceInfo {
    /// Source facts derived from the path alone. Audio is unknown.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let is_animated_loop = is_animated_loop_path(&path);
        Self {
            path,
            has_audio: false,
            is_animated_loop,
        }
    }

    pub fn with_audio(mut self, has_audio: bool) -> Self {
        self.has_audio = has_audio;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animated_loop_detection() {
        assert!(is_animated_loop_path(Path::new("clip.gif")));
        assert!(is_animated_loop_path(Path::new("/tmp/CLIP.GIF")));
        assert!(!is_animated_loop_path(Path::new("clip.mp4")));
        assert!(!is_animated_loop_path(Path::new("gif")));
    }

    #[test]
    fn test_from_path_defaults() {
        let info = SourceInfo::from_path("clip.gif").with_audio(true);
        assert!(info.is_animated_loop);
        assert!(info.has_audio);
        assert!(!SourceInfo::from_path("clip.mp4").has_audio);
    }
}
