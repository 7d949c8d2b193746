//! Danmaku options
//!
//! `DanmakuOptions` is the effective configuration. `DanmakuOverrides` holds the
//! subset a user (or an options file) changed; it is merged over the defaults at
//! construction and again on every `reset_options`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::comment::BlockKind;

/// Default color palette offered to users
pub const DEFAULT_COLORS: [&str; 14] = [
    "#FE0302", "#FF7204", "#FFAA02", "#FFD302", "#FFFF00", "#A0EE00", "#00CD00", "#019899",
    "#4266BE", "#89D5FF", "#CC0273", "#222222", "#9B9B9B", "#FFFFFF",
];

/// Vertical fraction of the viewport used for lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "f64", into = "f64")]
pub enum Area {
    Quarter,
    #[default]
    Half,
    ThreeQuarters,
    Full,
}

impl Area {
    pub fn all() -> [Area; 4] {
        [Area::Quarter, Area::Half, Area::ThreeQuarters, Area::Full]
    }

    pub fn fraction(self) -> f64 {
        match self {
            Area::Quarter => 0.25,
            Area::Half => 0.5,
            Area::ThreeQuarters => 0.75,
            Area::Full => 1.0,
        }
    }

    /// Map a fraction to an area, `None` for anything outside the four steps
    pub fn from_fraction(value: f64) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|area| (area.fraction() - value).abs() < f64::EPSILON)
    }
}

impl TryFrom<f64> for Area {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Area::from_fraction(value)
            .ok_or_else(|| format!("area must be one of 0.25, 0.5, 0.75, 1 (got {})", value))
    }
}

impl From<Area> for f64 {
    fn from(area: Area) -> Self {
        area.fraction()
    }
}

/// Effective danmaku configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DanmakuOptions {
    /// Start detached from the player
    pub disable: bool,
    pub blocked: BTreeSet<BlockKind>,
    /// Base font size in pixels
    pub fontsize: f64,
    pub fontsize_scale: f64,
    pub opacity: f64,
    /// Scroll speed multiplier
    pub speed: f64,
    pub area: Area,
    /// Narrow the fire window and drop rejected comments one by one
    pub unlimited: bool,
    /// Stack scroll lanes from the bottom of the viewport
    pub bottom_up: bool,
    pub colors: Vec<String>,
    /// Display time of pinned comments in seconds
    pub duration: f64,
}

impl Default for DanmakuOptions {
    fn default() -> Self {
        Self {
            disable: false,
            blocked: BTreeSet::new(),
            fontsize: 24.0,
            fontsize_scale: 1.0,
            opacity: 1.0,
            speed: 1.0,
            area: Area::Half,
            unlimited: false,
            bottom_up: false,
            colors: DEFAULT_COLORS.iter().map(|c| c.to_string()).collect(),
            duration: 5.0,
        }
    }
}

impl DanmakuOptions {
    /// Defaults with `overrides` applied on top
    pub fn with_overrides(overrides: &DanmakuOverrides) -> Self {
        let mut opts = Self::default();
        overrides.apply(&mut opts);
        opts
    }

    /// Rendered font size in pixels
    pub fn font_px(&self) -> f64 {
        self.fontsize * self.fontsize_scale
    }
}

/// Partial options supplied by the embedder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DanmakuOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<BTreeSet<BlockKind>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fontsize: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fontsize_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Area>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlimited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom_up: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl DanmakuOverrides {
    fn apply(&self, opts: &mut DanmakuOptions) {
        if let Some(v) = self.disable {
            opts.disable = v;
        }
        if let Some(v) = &self.blocked {
            opts.blocked = v.clone();
        }
        if let Some(v) = self.fontsize {
            opts.fontsize = v;
        }
        if let Some(v) = self.fontsize_scale {
            opts.fontsize_scale = v;
        }
        if let Some(v) = self.opacity {
            opts.opacity = v;
        }
        if let Some(v) = self.speed {
            opts.speed = v;
        }
        if let Some(v) = self.area {
            opts.area = v;
        }
        if let Some(v) = self.unlimited {
            opts.unlimited = v;
        }
        if let Some(v) = self.bottom_up {
            opts.bottom_up = v;
        }
        if let Some(v) = &self.colors {
            opts.colors = v.clone();
        }
        if let Some(v) = self.duration {
            opts.duration = v;
        }
    }

    /// Get the default options file path
    pub fn file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "rustle", "Rustle")
            .map(|dirs| dirs.config_dir().join("danmaku.json"))
    }

    /// Load overrides from the default file, or empty overrides if missing
    pub fn load() -> Self {
        Self::file_path()
            .and_then(|path| Self::load_from_file(&path).ok())
            .unwrap_or_default()
    }

    pub fn load_from_file(path: &Path) -> Result<Self, OptionsError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| OptionsError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| OptionsError::Parse(e.to_string()))
    }

    pub fn save(&self) -> Result<(), OptionsError> {
        if let Some(path) = Self::file_path() {
            self.save_to_file(&path)
        } else {
            Err(OptionsError::Io(
                "Could not determine config directory".to_string(),
            ))
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), OptionsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| OptionsError::Io(e.to_string()))?;
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| OptionsError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| OptionsError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Errors reading or writing option and comment files
#[derive(Debug, Clone)]
pub enum OptionsError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for OptionsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionsError::Io(e) => write!(f, "IO error: {}", e),
            OptionsError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for OptionsError {}
