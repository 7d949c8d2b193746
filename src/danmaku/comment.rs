//! Comment data model
//!
//! `CommentItem` is the externally supplied, time-stamped comment.
//! `CommentType` picks the lane family, `BlockKind` is what a user can filter.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::options::OptionsError;

/// Lane family a comment is displayed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommentType {
    /// Scrolls right to left across the viewport
    #[default]
    Scroll,
    /// Pinned to the top of the viewport
    Top,
    /// Pinned to the bottom of the viewport
    Bottom,
}

impl CommentType {
    pub fn all() -> [CommentType; 3] {
        [CommentType::Scroll, CommentType::Top, CommentType::Bottom]
    }

    /// The filter category matching this family
    pub fn block_kind(self) -> BlockKind {
        match self {
            CommentType::Scroll => BlockKind::Scroll,
            CommentType::Top => BlockKind::Top,
            CommentType::Bottom => BlockKind::Bottom,
        }
    }
}

impl std::fmt::Display for CommentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentType::Scroll => write!(f, "scroll"),
            CommentType::Top => write!(f, "top"),
            CommentType::Bottom => write!(f, "bottom"),
        }
    }
}

/// Comment categories that can be blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Scroll,
    Top,
    Bottom,
    /// Comments carrying a color outside the palette
    Color,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockKind::Scroll => write!(f, "scroll"),
            BlockKind::Top => write!(f, "top"),
            BlockKind::Bottom => write!(f, "bottom"),
            BlockKind::Color => write!(f, "color"),
        }
    }
}

/// A single timed comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommentItem {
    /// Playback time in seconds at which the comment starts appearing
    pub time: f64,
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: CommentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Bypass spacing/saturation rejection and displace the lane occupant
    #[serde(default)]
    pub force: bool,
    /// Authored locally
    #[serde(default)]
    pub is_me: bool,
}

impl CommentItem {
    pub fn new(time: f64, text: impl Into<String>) -> Self {
        Self {
            time,
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: CommentType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Load a JSON array of comments
///
/// Entries are kept in file order; the scheduler expects them time-ascending.
pub fn load_comments(path: &Path) -> Result<Vec<CommentItem>, OptionsError> {
    let content = std::fs::read_to_string(path).map_err(|e| OptionsError::Io(e.to_string()))?;
    let items: Vec<CommentItem> =
        serde_json::from_str(&content).map_err(|e| OptionsError::Parse(e.to_string()))?;
    if items.windows(2).any(|w| w[1].time < w[0].time) {
        tracing::warn!(
            "Comments in {:?} are not time-ascending, late entries may be skipped",
            path
        );
    }
    Ok(items)
}

/// Lowercased bytes of a CSS color with 3-digit hex expanded
///
/// `#fff` and `#FFFFFF` yield the same bytes; non-hex strings are only
/// lowercased.
fn color_bytes(color: &str) -> impl Iterator<Item = u8> + '_ {
    let color = color.trim();
    let short_hex = color.len() == 4
        && color.starts_with('#')
        && color.bytes().skip(1).all(|b| b.is_ascii_hexdigit());
    let repeat = if short_hex { 2 } else { 1 };
    color.bytes().enumerate().flat_map(move |(i, b)| {
        std::iter::repeat_n(b.to_ascii_lowercase(), if i == 0 { 1 } else { repeat })
    })
}

/// Whether `color` belongs to the palette
///
/// Palette colors are exempt from color blocking. Compares without
/// allocating, so it is safe on the insertion path.
pub fn is_default_color(color: &str, palette: &[String]) -> bool {
    palette
        .iter()
        .any(|entry| color_bytes(entry).eq(color_bytes(color)))
}
