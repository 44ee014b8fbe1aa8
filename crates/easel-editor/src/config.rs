//! Editor configuration.
//!
//! Every struct has a `Default` matching the stock editor and deserializes
//! with `#[serde(default)]`, so a host only spells out what it overrides.

use crate::error::EditorError;
use easel_core::Color;
use serde::{Deserialize, Serialize};

/// Session-level options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Largest pointer travel (screen px) between press and release that still
    /// counts as a click. `0.0`: only a press and release at the same spot.
    pub click_tolerance: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { click_tolerance: 0.0 }
    }
}

/// History plugin options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryOptions {
    /// Start recording immediately.
    pub enabled: bool,
    /// Maximum number of undoable steps. Zero is treated as one.
    pub stack_size: usize,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            stack_size: 50,
        }
    }
}

/// Outline drawn around each selected node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub stroke: Color,
    pub stroke_width: f64,
    pub dash: Vec<f64>,
    /// Gap between the node and its outline, in screen pixels.
    pub padding: f64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            stroke: Color::rgba(0.353, 0.478, 0.945, 1.0),
            stroke_width: 2.0,
            dash: vec![4.0, 4.0],
            padding: 2.0,
        }
    }
}

/// Transform handle group options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Gap between the selection box and the handle frame, in screen pixels.
    pub padding: f64,
    /// Measure node boxes without their stroke.
    pub ignore_stroke: bool,
    pub border_stroke: Color,
    pub border_stroke_width: f64,
    pub border_dash: Vec<f64>,
    /// Side length of the square anchors, in screen pixels.
    pub anchor_size: f64,
    pub anchor_stroke: Color,
    pub anchor_corner_radius: f64,
    pub anchor_stroke_width: f64,
    /// Distance of the rotate anchor above the frame's top edge.
    pub rotate_anchor_offset: f64,
    pub rotate_enabled: bool,
    /// Corner anchors scale both axes by the same factor.
    pub keep_ratio: bool,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            padding: 0.0,
            ignore_stroke: true,
            border_stroke: Color::rgba(0.353, 0.478, 0.945, 1.0),
            border_stroke_width: 1.0,
            border_dash: Vec::new(),
            anchor_size: 10.0,
            anchor_stroke: Color::rgba(0.353, 0.478, 0.945, 1.0),
            anchor_corner_radius: 2.0,
            anchor_stroke_width: 1.0,
            rotate_anchor_offset: 30.0,
            rotate_enabled: true,
            keep_ratio: true,
        }
    }
}

/// Selector plugin options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorOptions {
    pub enabled: bool,
    /// Shift-click toggles nodes in and out of the selection.
    pub multiple_select: bool,
    pub transformer: TransformerConfig,
    pub highlight: HighlightConfig,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            multiple_select: true,
            transformer: TransformerConfig::default(),
            highlight: HighlightConfig::default(),
        }
    }
}

/// Everything a host configures, in one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub app: AppConfig,
    pub history: HistoryOptions,
    pub selector: SelectorOptions,
}

impl EditorConfig {
    /// Parse a JSON configuration document.
    ///
    /// # Errors
    /// Returns [`EditorError::Config`] when the JSON is malformed or a field
    /// has the wrong type.
    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        Ok(serde_json::from_str(json)?)
    }
}
