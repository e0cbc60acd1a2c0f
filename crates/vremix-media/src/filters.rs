//! Named color filters and their FFmpeg expressions.
//!
//! The catalog is ordered configuration data. Three meta entries are always
//! present: `none` (no-op), `random` (pick one concrete entry per file) and
//! `random_color` (fresh brightness/contrast/saturation/hue values per file).

use serde::Deserialize;
use std::path::Path;
use tracing::warn;

use crate::error::{MediaError, MediaResult};
use crate::random::RandomSource;

/// Meta entry: apply nothing.
pub const FILTER_NONE: &str = "none";
/// Meta entry: pick one concrete entry uniformly.
pub const FILTER_RANDOM: &str = "random";
/// Meta entry: random color adjustment.
pub const FILTER_RANDOM_COLOR: &str = "random_color";

/// Template used by `random_color`.
pub const RANDOM_COLOR_TEMPLATE: &str =
    "eq=brightness={br}:contrast={ct}:saturation={sat},hue=h={hue}";

const PLACEHOLDERS: &[&str] = &["{br}", "{ct}", "{sat}", "{hue}"];

/// Built-in concrete filters, in display order.
const BUILTIN_FILTERS: &[(&str, &str)] = &[
    ("grayscale", "hue=s=0"),
    (
        "sepia",
        "colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131",
    ),
    ("vintage", "curves=preset=vintage"),
    ("negative", "negate"),
    ("warm", "colorbalance=rs=0.1:gs=0.05:bs=-0.1"),
    ("cold", "colorbalance=rs=-0.1:bs=0.15"),
    ("vignette", "vignette=PI/5"),
    ("sharpen", "unsharp=5:5:1.0:5:5:0.0"),
    ("soft_blur", "boxblur=2:1"),
    ("high_contrast", "eq=contrast=1.3"),
    ("vivid", "eq=saturation=1.5"),
    ("mirror", "hflip"),
    ("soft_grade", "eq=brightness={br}:contrast={ct}:saturation={sat}"),
];

/// What a catalog entry does when applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    NoOp,
    RandomPick,
    RandomColorAdjust,
    /// Expression used verbatim
    Fixed(String),
    /// Expression with `{br}`, `{ct}`, `{sat}`, `{hue}` placeholders
    Parametric(String),
}

impl FilterKind {
    /// Classify an expression by whether it carries placeholders.
    pub fn from_expression(expr: impl Into<String>) -> Self {
        let expr = expr.into();
        if PLACEHOLDERS.iter().any(|p| expr.contains(p)) {
            FilterKind::Parametric(expr)
        } else {
            FilterKind::Fixed(expr)
        }
    }

    pub fn is_meta(&self) -> bool {
        matches!(
            self,
            FilterKind::NoOp | FilterKind::RandomPick | FilterKind::RandomColorAdjust
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEntry {
    pub name: String,
    pub kind: FilterKind,
}

/// Sampling ranges for parametric templates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAdjustRanges {
    pub brightness: (f64, f64),
    pub contrast: (f64, f64),
    pub saturation: (f64, f64),
    pub hue: (f64, f64),
}

impl Default for ColorAdjustRanges {
    fn default() -> Self {
        Self {
            brightness: (-0.15, 0.15),
            contrast: (0.8, 1.2),
            saturation: (0.8, 1.3),
            hue: (-5.0, 5.0),
        }
    }
}

impl ColorAdjustRanges {
    /// Draw one value per placeholder and substitute them into `template`.
    pub fn fill(&self, template: &str, rng: &mut dyn RandomSource) -> String {
        let br = rng.float_range(self.brightness.0, self.brightness.1);
        let ct = rng.float_range(self.contrast.0, self.contrast.1);
        let sat = rng.float_range(self.saturation.0, self.saturation.1);
        let hue = rng.float_range(self.hue.0, self.hue.1);

        template
            .replace("{br}", &format!("{:.3}", br))
            .replace("{ct}", &format!("{:.3}", ct))
            .replace("{sat}", &format!("{:.3}", sat))
            .replace("{hue}", &format!("{:.3}", hue))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFileEntry {
    name: String,
    expression: String,
}

/// Ordered map of filter names to behavior.
#[derive(Debug, Clone)]
pub struct FilterCatalog {
    entries: Vec<FilterEntry>,
    ranges: ColorAdjustRanges,
}

impl Default for FilterCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FilterCatalog {
    /// Catalog holding only the meta entries.
    fn meta_only() -> Self {
        Self {
            entries: vec![
                FilterEntry {
                    name: FILTER_NONE.to_string(),
                    kind: FilterKind::NoOp,
                },
                FilterEntry {
                    name: FILTER_RANDOM.to_string(),
                    kind: FilterKind::RandomPick,
                },
                FilterEntry {
                    name: FILTER_RANDOM_COLOR.to_string(),
                    kind: FilterKind::RandomColorAdjust,
                },
            ],
            ranges: ColorAdjustRanges::default(),
        }
    }

    /// Built-in catalog.
    pub fn builtin() -> Self {
        BUILTIN_FILTERS
            .iter()
            .fold(Self::meta_only(), |catalog, (name, expr)| catalog.with_entry(*name, *expr))
    }

    /// Catalog from `(name, expression)` pairs, plus the meta entries.
    pub fn from_entries<I, N, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, E)>,
        N: Into<String>,
        E: Into<String>,
    {
        entries
            .into_iter()
            .fold(Self::meta_only(), |catalog, (name, expr)| catalog.with_entry(name, expr))
    }

    /// Parse a JSON array of `{"name", "expression"}` objects.
    pub fn from_json_str(json: &str) -> MediaResult<Self> {
        let entries: Vec<CatalogFileEntry> = serde_json::from_str(json)?;
        if let Some(bad) = entries.iter().find(|e| e.name.trim().is_empty()) {
            return Err(MediaError::invalid_catalog(format!(
                "filter with empty name (expression {:?})",
                bad.expression
            )));
        }
        Ok(Self::from_entries(
            entries.into_iter().map(|e| (e.name, e.expression)),
        ))
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Add or replace a concrete entry. Meta names and empty expressions are ignored.
    pub fn with_entry(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        let name = name.into();
        let expression = expression.into();
        if expression.trim().is_empty()
            || self.get(&name).map(|e| e.kind.is_meta()).unwrap_or(false)
        {
            return self;
        }

        let kind = FilterKind::from_expression(expression);
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.kind = kind,
            None => self.entries.push(FilterEntry { name, kind }),
        }
        self
    }

    /// Override the sampling ranges for parametric templates.
    pub fn with_ranges(mut self, ranges: ColorAdjustRanges) -> Self {
        self.ranges = ranges;
        self
    }

    pub fn get(&self, name: &str) -> Option<&FilterEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Entry names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries eligible for `random`.
    fn concrete(&self) -> Vec<&FilterEntry> {
        self.entries.iter().filter(|e| !e.kind.is_meta()).collect()
    }

    fn expand(&self, kind: &FilterKind, rng: &mut dyn RandomSource) -> Option<String> {
        match kind {
            FilterKind::NoOp => None,
            FilterKind::Fixed(expr) => Some(expr.clone()),
            FilterKind::Parametric(template) => Some(self.ranges.fill(template, rng)),
            FilterKind::RandomColorAdjust => Some(self.ranges.fill(RANDOM_COLOR_TEMPLATE, rng)),
            FilterKind::RandomPick => {
                let candidates = self.concrete();
                if candidates.is_empty() {
                    warn!("Random filter requested but the catalog has no concrete filters");
                    return None;
                }
                let chosen = candidates[rng.index(candidates.len())];
                self.expand(&chosen.kind, rng)
            }
        }
    }

    /// Resolve names into filter expressions, in order.
    ///
    /// Unknown names are skipped with a warning. Draws happen per call, so
    /// each file gets its own random picks.
    pub fn resolve_chain(&self, names: &[String], rng: &mut dyn RandomSource) -> Vec<String> {
        let mut chain = Vec::new();
        for name in names {
            match self.get(name) {
                Some(entry) => {
                    if let Some(expr) = self.expand(&entry.kind, rng) {
                        chain.push(expr);
                    }
                }
                None => warn!(filter = %name, "Unknown color filter, skipping"),
            }
        }
        chain
    }
}
