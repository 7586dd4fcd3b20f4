//! Text notes, freehand drawings and error placeholders: the variants
//! without binary data.

use serde::{Deserialize, Serialize};

use crate::item::transform::Point;

// ─── Text ────────────────────────────────────────────────────────────────────

/// Font settings for a text note. Absent fields fall back to the board
/// defaults at render time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FontSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub family: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub size:   Option<f64>,
  #[serde(default)]
  pub bold:   bool,
  #[serde(default)]
  pub italic: bool,
}

/// A plain-text note. Serialised as-is into `items.data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
  #[serde(default = "default_text")]
  pub text:             String,
  /// `#rrggbb` or `#aarrggbb`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub color:            Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub background_color: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub font:             Option<FontSpec>,
}

fn default_text() -> String { "Text".to_owned() }

impl TextData {
  pub fn new(text: impl Into<String>) -> Self {
    Self { text: text.into(), color: None, background_color: None, font: None }
  }
}

impl Default for TextData {
  fn default() -> Self { Self::new(default_text()) }
}

// ─── Draw ────────────────────────────────────────────────────────────────────

pub const MIN_PEN_WIDTH: u32 = 1;
pub const MAX_PEN_WIDTH: u32 = 50;

/// Line decoration of a drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PenStyle {
  #[default]
  #[serde(rename = "solid")]
  Solid,
  #[serde(rename = "dashed")]
  Dashed,
  /// Arrow head at the end of the path.
  #[serde(rename = "arrow")]
  Arrow,
  /// Arrow head at the start of the path.
  #[serde(rename = "<-")]
  ArrowStart,
  #[serde(rename = "<->")]
  ArrowBoth,
}

/// A freehand polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawData {
  #[serde(default)]
  pub path:      Vec<Point>,
  #[serde(default = "default_pen_color")]
  pub pen_color: String,
  #[serde(default = "default_pen_width", deserialize_with = "pen_width")]
  pub pen_width: u32,
  #[serde(default)]
  pub pen_style: PenStyle,
}

fn default_pen_color() -> String { "#c8c8c8".to_owned() }

fn default_pen_width() -> u32 { 8 }

fn pen_width<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let width = f64::deserialize(deserializer)?;
  Ok(clamp_pen_width(width.round() as i64))
}

pub fn clamp_pen_width(width: i64) -> u32 {
  width.clamp(i64::from(MIN_PEN_WIDTH), i64::from(MAX_PEN_WIDTH)) as u32
}

impl DrawData {
  pub fn new(path: Vec<Point>) -> Self {
    Self {
      path,
      pen_color: default_pen_color(),
      pen_width: default_pen_width(),
      pen_style: PenStyle::default(),
    }
  }

  pub fn set_pen_width(&mut self, width: i64) {
    self.pen_width = clamp_pen_width(width);
  }
}

impl Default for DrawData {
  fn default() -> Self { Self::new(Vec::new()) }
}

// ─── Error placeholder ───────────────────────────────────────────────────────

/// Stands in for an item whose stored data could not be decoded.
///
/// Never written to an archive. While it is on the board, the row it replaces
/// (`original_save_id`) is left untouched by saves.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorData {
  pub text:             String,
  pub original_save_id: Option<i64>,
}
