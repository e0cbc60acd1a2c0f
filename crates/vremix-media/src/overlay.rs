//! Overlay anchors and the overlay filter stage.

use serde::Deserialize;
use std::path::Path;
use tracing::warn;

use crate::error::{MediaError, MediaResult};

/// Anchor used when none is given or the name is unknown.
pub const DEFAULT_ANCHOR: &str = "center";

/// Position expression for the default anchor.
pub const CENTER_POSITION: &str = "x=(W-w)/2:y=(H-h)/2";

/// Distance from the frame edge for edge anchors, in pixels.
const EDGE_MARGIN: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Anchor {
    name: String,
    position: String,
}

#[derive(Debug, Deserialize)]
struct AnchorFileEntry {
    name: String,
    position: String,
}

/// Named overlay positions mapped to `overlay` filter coordinates.
#[derive(Debug, Clone)]
pub struct AnchorTable {
    anchors: Vec<Anchor>,
}

impl Default for AnchorTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AnchorTable {
    /// 3x3 grid of anchors with a small margin at the edges.
    pub fn builtin() -> Self {
        let m = EDGE_MARGIN;
        let left = format!("x={}", m);
        let hcenter = "x=(W-w)/2".to_string();
        let right = format!("x=W-w-{}", m);
        let top = format!("y={}", m);
        let vcenter = "y=(H-h)/2".to_string();
        let bottom = format!("y=H-h-{}", m);

        let grid = [
            ("top_left", &left, &top),
            ("top_center", &hcenter, &top),
            ("top_right", &right, &top),
            ("center_left", &left, &vcenter),
            (DEFAULT_ANCHOR, &hcenter, &vcenter),
            ("center_right", &right, &vcenter),
            ("bottom_left", &left, &bottom),
            ("bottom_center", &hcenter, &bottom),
            ("bottom_right", &right, &bottom),
        ];

        Self {
            anchors: grid
                .iter()
                .map(|(name, x, y)| Anchor {
                    name: name.to_string(),
                    position: format!("{}:{}", x, y),
                })
                .collect(),
        }
    }

    /// Parse a JSON array of `{"name", "position"}` objects.
    ///
    /// A `center` anchor is added when the file does not define one.
    pub fn from_json_str(json: &str) -> MediaResult<Self> {
        let entries: Vec<AnchorFileEntry> = serde_json::from_str(json)?;
        let mut anchors: Vec<Anchor> = Vec::with_capacity(entries.len() + 1);

        for entry in entries {
            if entry.name.trim().is_empty() || entry.position.trim().is_empty() {
                return Err(MediaError::invalid_catalog(format!(
                    "anchor {:?} must have a name and a position",
                    entry.name
                )));
            }
            match anchors.iter_mut().find(|a| a.name == entry.name) {
                Some(existing) => existing.position = entry.position,
                None => anchors.push(Anchor {
                    name: entry.name,
                    position: entry.position,
                }),
            }
        }

        if !anchors.iter().any(|a| a.name == DEFAULT_ANCHOR) {
            anchors.push(Anchor {
                name: DEFAULT_ANCHOR.to_string(),
                position: CENTER_POSITION.to_string(),
            });
        }

        Ok(Self { anchors })
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> MediaResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Anchor names in table order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.anchors.iter().map(|a| a.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.anchors
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.position.as_str())
    }

    /// Position for `name`, falling back to center for unknown names.
    pub fn position(&self, name: &str) -> &str {
        match self.get(name) {
            Some(position) => position,
            None => {
                warn!(anchor = %name, "Unknown overlay anchor, using center");
                self.get(DEFAULT_ANCHOR).unwrap_or(CENTER_POSITION)
            }
        }
    }
}

/// Overlay filter: `overlay=<position>:shortest=1`.
pub fn overlay_filter(position: &str) -> String {
    format!("overlay={}:shortest=1", position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_grid() {
        let table = AnchorTable::builtin();
        assert_eq!(table.names().count(), 9);
        assert_eq!(table.get("center"), Some(CENTER_POSITION));
        assert_eq!(table.get("bottom_right"), Some("x=W-w-10:y=H-h-10"));
        assert_eq!(table.get("top_left"), Some("x=10:y=10"));
    }

    #[test]
    fn test_unknown_anchor_falls_back_to_center() {
        let table = AnchorTable::builtin();
        assert_eq!(table.position("somewhere"), CENTER_POSITION);
    }

    #[test]
    fn test_from_json_adds_center() {
        let table =
            AnchorTable::from_json_str(r#"[{"name": "corner", "position": "x=0:y=0"}]"#).unwrap();
        assert_eq!(table.position("corner"), "x=0:y=0");
        assert_eq!(table.position("nope"), CENTER_POSITION);
    }

    #[test]
    fn test_from_json_rejects_empty_position() {
        tokio_test::assert_err!(AnchorTable::from_json_str(r#"[{"name": "a", "position": ""}]"#));
    }

    #[test]
    fn test_overlay_filter() {
        assert_eq!(
            overlay_filter(CENTER_POSITION),
            "overlay=x=(W-w)/2:y=(H-h)/2:shortest=1"
        );
    }
}
