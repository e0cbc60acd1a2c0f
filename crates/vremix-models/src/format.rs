//! Output canvas handling and named social-platform presets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::transform::SpecError;

/// How the output frame relates to the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Keep source dimensions
    #[default]
    Original,
    /// Fit the source into a fixed canvas (vertical social formats)
    Canvas {
        width: u32,
        height: u32,
        /// Fill the bars with a blurred copy instead of black
        #[serde(default)]
        blur_background: bool,
    },
}

impl OutputFormat {
    /// Canvas without blurred backdrop.
    pub fn canvas(width: u32, height: u32) -> Self {
        OutputFormat::Canvas {
            width,
            height,
            blur_background: false,
        }
    }

    /// Toggle the blurred backdrop. No effect on `Original`.
    pub fn with_blur(self, blur: bool) -> Self {
        match self {
            OutputFormat::Canvas { width, height, .. } => OutputFormat::Canvas {
                width,
                height,
                blur_background: blur,
            },
            other => other,
        }
    }

    pub fn is_canvas(&self) -> bool {
        matches!(self, OutputFormat::Canvas { .. })
    }

    /// Canvas dimensions, if any.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match *self {
            OutputFormat::Canvas { width, height, .. } => Some((width, height)),
            OutputFormat::Original => None,
        }
    }

    /// Suffix appended to the source stem when naming the output file.
    pub fn output_suffix(&self) -> &'static str {
        match self {
            OutputFormat::Original => "_processed",
            OutputFormat::Canvas { .. } => "_reels",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Original => write!(f, "original"),
            OutputFormat::Canvas {
                width,
                height,
                blur_background,
            } => {
                write!(f, "{}x{}", width, height)?;
                if *blur_background {
                    write!(f, " (blur)")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SpecError;

    /// Accepts `original`, a preset key, or `WIDTHxHEIGHT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower == "original" {
            return Ok(OutputFormat::Original);
        }
        if let Some(preset) = FormatPreset::find(&lower) {
            return Ok(preset.format());
        }
        if let Some((w, h)) = lower.split_once('x') {
            if let (Ok(width), Ok(height)) = (w.parse::<u32>(), h.parse::<u32>()) {
                return Ok(OutputFormat::canvas(width, height));
            }
        }
        Err(SpecError::UnknownFormat(s.to_string()))
    }
}

/// A named canvas size for a social platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatPreset {
    /// Lookup key (`reels`, `instagram_post`, ...)
    pub key: &'static str,
    /// Human-readable label
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

impl FormatPreset {
    pub const ALL: &'static [FormatPreset] = &[
        FormatPreset::new("reels", "Reels/TikTok", 1080, 1920),
        FormatPreset::new("tiktok", "Reels/TikTok", 1080, 1920),
        FormatPreset::new("youtube_shorts", "YouTube Shorts", 1080, 1920),
        FormatPreset::new("instagram_story", "Instagram Story", 1080, 1920),
        FormatPreset::new("instagram_post", "Instagram Post", 1080, 1080),
        FormatPreset::new("instagram_landscape", "Instagram Landscape", 1920, 1080),
        FormatPreset::new("instagram_portrait", "Instagram Portrait", 1080, 1350),
        FormatPreset::new("vk_clip", "VK Clip", 1080, 1920),
        FormatPreset::new("telegram_story", "Telegram Story", 1080, 1920),
        FormatPreset::new("telegram_post", "Telegram Post", 1280, 720),
        FormatPreset::new("youtube", "YouTube", 1920, 1080),
        FormatPreset::new("youtube_vertical", "YouTube Vertical", 1080, 1920),
        FormatPreset::new("facebook_story", "Facebook Story", 1080, 1920),
        FormatPreset::new("facebook_post", "Facebook Post", 1200, 630),
        FormatPreset::new("twitter_post", "Twitter Post", 1600, 900),
        FormatPreset::new("twitter_portrait", "Twitter Portrait", 1080, 1350),
        FormatPreset::new("snapchat", "Snapchat", 1080, 1920),
        FormatPreset::new("pinterest", "Pinterest", 1000, 1500),
    ];

    const fn new(key: &'static str, label: &'static str, width: u32, height: u32) -> Self {
        Self {
            key,
            label,
            width,
            height,
        }
    }

    /// Find a preset by key (case-insensitive, `-` and spaces treated as `_`).
    pub fn find(key: &str) -> Option<&'static FormatPreset> {
        let normalized = key.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL.iter().find(|p| p.key == normalized)
    }

    /// Canvas format for this preset, without blurred backdrop.
    pub fn format(&self) -> OutputFormat {
        OutputFormat::canvas(self.width, self.height)
    }
}
