//! Transform specification supplied once per batch run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::format::OutputFormat;

/// Neutral percentage for zoom and speed (no change).
pub const NEUTRAL_PERCENT: u32 = 100;

/// A percentage parameter that is either fixed or drawn per file from a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParamSpec {
    /// Same value for every file
    Fixed(u32),
    /// Uniform draw from the inclusive interval `[min, max]`
    Range { min: u32, max: u32 },
}

impl Default for ParamSpec {
    fn default() -> Self {
        ParamSpec::Fixed(NEUTRAL_PERCENT)
    }
}

impl ParamSpec {
    /// Create a range spec.
    pub fn range(min: u32, max: u32) -> Self {
        ParamSpec::Range { min, max }
    }

    /// Smallest value this spec can produce.
    pub fn min(&self) -> u32 {
        match *self {
            ParamSpec::Fixed(v) => v,
            ParamSpec::Range { min, .. } => min,
        }
    }

    /// Check the range bounds. `field` names the parameter in the error.
    pub fn validate(&self, field: &'static str) -> Result<(), SpecError> {
        match *self {
            ParamSpec::Range { min, max } if max < min => {
                Err(SpecError::InvalidRange { field, min, max })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSpec::Fixed(v) => write!(f, "{}%", v),
            ParamSpec::Range { min, max } => write!(f, "{}..={}%", min, max),
        }
    }
}

/// Image or animation composited over every output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OverlaySpec {
    /// Overlay file (PNG, JPG, GIF, ...)
    pub path: PathBuf,
    /// Key into the anchor table (e.g. "center", "bottom_right")
    #[serde(default = "default_anchor")]
    pub anchor: String,
}

fn default_anchor() -> String {
    "center".to_string()
}

fn default_true() -> bool {
    true
}

impl OverlaySpec {
    /// Create an overlay spec.
    pub fn new(path: impl Into<PathBuf>, anchor: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            anchor: anchor.into(),
        }
    }

    /// Whether the overlay is itself animated and must be looped.
    pub fn is_animated(&self) -> bool {
        crate::is_animated_loop_path(&self.path)
    }
}

/// Declarative description of what to do to every file in a batch.
///
/// Immutable for the duration of a run and shared by reference across jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransformSpec {
    /// Ordered filter names resolved against the filter catalog
    #[serde(default)]
    pub color_filters: Vec<String>,

    /// Zoom percentage
    #[serde(default)]
    pub zoom: ParamSpec,

    /// Playback speed percentage
    #[serde(default)]
    pub speed: ParamSpec,

    /// Optional overlay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlaySpec>,

    /// Output canvas handling
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Drop the audio track entirely
    #[serde(default)]
    pub mute_audio: bool,

    /// Drop metadata and chapters from the output
    #[serde(default = "default_true")]
    pub strip_metadata: bool,
}

impl Default for TransformSpec {
    fn default() -> Self {
        Self {
            color_filters: Vec::new(),
            zoom: ParamSpec::default(),
            speed: ParamSpec::default(),
            overlay: None,
            output_format: OutputFormat::default(),
            mute_audio: false,
            strip_metadata: true,
        }
    }
}

impl TransformSpec {
    /// Parse a spec from JSON.
    pub fn from_json(json: &str) -> Result<Self, SpecError> {
        serde_json::from_str(json).map_err(|e| SpecError::Parse(e.to_string()))
    }

    /// Set the zoom spec.
    pub fn with_zoom(mut self, zoom: ParamSpec) -> Self {
        self.zoom = zoom;
        self
    }

    /// Set the speed spec.
    pub fn with_speed(mut self, speed: ParamSpec) -> Self {
        self.speed = speed;
        self
    }

    /// Set the output format.
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set the overlay.
    pub fn with_overlay(mut self, overlay: OverlaySpec) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Append a color filter by name.
    pub fn with_filter(mut self, name: impl Into<String>) -> Self {
        self.color_filters.push(name.into());
        self
    }

    /// Mute the output.
    pub fn muted(mut self) -> Self {
        self.mute_audio = true;
        self
    }

    /// Validate the whole spec. Run once before any job is dispatched.
    pub fn validate(&self) -> Result<(), SpecError> {
        self.zoom.validate("zoom")?;
        self.speed.validate("speed")?;
        if self.zoom.min() == 0 {
            return Err(SpecError::ZeroPercent { field: "zoom" });
        }
        if self.speed.min() == 0 {
            return Err(SpecError::ZeroPercent { field: "speed" });
        }
        if let OutputFormat::Canvas { width, height, .. } = self.output_format {
            if width == 0 || height == 0 {
                return Err(SpecError::EmptyCanvas { width, height });
            }
        }
        Ok(())
    }
}

/// Errors in a transform specification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("Invalid {field} range: min {min} is greater than max {max}")]
    InvalidRange {
        field: &'static str,
        min: u32,
        max: u32,
    },

    #[error("{field} must be greater than 0%")]
    ZeroPercent { field: &'static str },

    #[error("Canvas must have non-zero dimensions, got {width}x{height}")]
    EmptyCanvas { width: u32, height: u32 },

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("Invalid transform spec: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec_is_valid() {
        tokio_test::assert_ok!(TransformSpec::default().validate());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let spec = TransformSpec::default().with_zoom(ParamSpec::range(120, 80));
        assert_eq!(
            spec.validate(),
            Err(SpecError::InvalidRange {
                field: "zoom",
                min: 120,
                max: 80
            })
        );

        let spec = TransformSpec::default().with_speed(ParamSpec::range(110, 90));
        assert!(matches!(
            spec.validate(),
            Err(SpecError::InvalidRange { field: "speed", .. })
        ));
    }

    #[test]
    fn test_degenerate_range_accepted() {
        let spec = TransformSpec::default().with_zoom(ParamSpec::range(100, 100));
        tokio_test::assert_ok!(spec.validate());
    }

    #[test]
    fn test_zero_percent_rejected() {
        let spec = TransformSpec::default().with_speed(ParamSpec::range(0, 50));
        assert_eq!(spec.validate(), Err(SpecError::ZeroPercent { field: "speed" }));

        let spec = TransformSpec::default().with_zoom(ParamSpec::Fixed(0));
        assert_eq!(spec.validate(), Err(SpecError::ZeroPercent { field: "zoom" }));
    }

    #[test]
    fn test_empty_canvas_rejected() {
        let spec = TransformSpec::default().with_output_format(OutputFormat::canvas(0, 1920));
        assert!(matches!(spec.validate(), Err(SpecError::EmptyCanvas { .. })));
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "color_filters": ["sepia", "random"],
            "zoom": {"range": {"min": 90, "max": 120}},
            "speed": {"fixed": 110},
            "overlay": {"path": "logo.png", "anchor": "bottom_right"},
            "output_format": {"canvas": {"width": 1080, "height": 1920, "blur_background": true}},
            "mute_audio": true
        }"#;

        let spec = TransformSpec::from_json(json).unwrap();
        assert_eq!(spec.color_filters, vec!["sepia", "random"]);
        assert_eq!(spec.zoom, ParamSpec::range(90, 120));
        assert_eq!(spec.speed, ParamSpec::Fixed(110));
        assert_eq!(spec.overlay.unwrap().anchor, "bottom_right");
        assert!(spec.output_format.is_canvas());
        assert!(spec.mute_audio);
        assert!(spec.strip_metadata);
    }

    #[test]
    fn test_overlay_default_anchor() {
        let overlay: OverlaySpec = serde_json::from_str(r#"{"path": "logo.gif"}"#).unwrap();
        assert_eq!(overlay.anchor, "center");
        assert!(overlay.is_animated());
    }
}
