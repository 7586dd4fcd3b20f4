//! Geometry shared by every item variant.

use serde::{Deserialize, Serialize};

// ─── Flip ────────────────────────────────────────────────────────────────────

/// Horizontal mirror flag. Stored in the archive as `1` or `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum Flip {
  #[default]
  Normal,
  Mirrored,
}

impl Flip {
  pub fn as_i64(self) -> i64 {
    match self {
      Self::Normal => 1,
      Self::Mirrored => -1,
    }
  }

  /// Any negative value reads as mirrored; everything else as normal.
  pub fn from_i64(value: i64) -> Self {
    if value < 0 { Self::Mirrored } else { Self::Normal }
  }

  pub fn toggled(self) -> Self {
    match self {
      Self::Normal => Self::Mirrored,
      Self::Mirrored => Self::Normal,
    }
  }
}

impl From<Flip> for i64 {
  fn from(flip: Flip) -> Self { flip.as_i64() }
}

impl From<i64> for Flip {
  fn from(value: i64) -> Self { Self::from_i64(value) }
}

// ─── Point / Rect ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
  pub x: f64,
  pub y: f64,
}

impl Point {
  pub fn new(x: f64, y: f64) -> Self { Self { x, y } }
}

/// An axis-aligned rectangle in item coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
  pub x:      f64,
  pub y:      f64,
  pub width:  f64,
  pub height: f64,
}

impl Rect {
  pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
    Self { x, y, width, height }
  }

  pub fn is_empty(&self) -> bool { self.width <= 0.0 || self.height <= 0.0 }

  pub fn right(&self) -> f64 { self.x + self.width }

  pub fn bottom(&self) -> f64 { self.y + self.height }

  /// The overlap of `self` and `other`; empty when they don't intersect.
  pub fn intersected(&self, other: &Rect) -> Rect {
    let x = self.x.max(other.x);
    let y = self.y.max(other.y);
    let right = self.right().min(other.right());
    let bottom = self.bottom().min(other.bottom());
    Rect::new(x, y, (right - x).max(0.0), (bottom - y).max(0.0))
  }

  /// `[x, y, w, h]`, the layout used in pixmap payloads.
  pub fn to_array(self) -> [f64; 4] { [self.x, self.y, self.width, self.height] }

  pub fn from_array([x, y, width, height]: [f64; 4]) -> Self {
    Self { x, y, width, height }
  }
}

// ─── Transform ───────────────────────────────────────────────────────────────

/// Position, stacking order and transformation of an item on the board.
///
/// These are the columns of the `items` table; everything else about an item
/// goes into its type-specific payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
  pub x:        f64,
  pub y:        f64,
  /// Paint and selection order; higher is on top.
  pub z:        f64,
  pub scale:    f64,
  /// Degrees, clockwise.
  pub rotation: f64,
  pub flip:     Flip,
}

impl Default for Transform {
  fn default() -> Self {
    Self { x: 0.0, y: 0.0, z: 0.0, scale: 1.0, rotation: 0.0, flip: Flip::Normal }
  }
}

impl Transform {
  pub fn at(x: f64, y: f64) -> Self { Self { x, y, ..Self::default() } }

  pub fn pos(&self) -> Point { Point::new(self.x, self.y) }

  pub fn set_pos(&mut self, pos: Point) {
    self.x = pos.x;
    self.y = pos.y;
  }

  pub fn moved_by(mut self, dx: f64, dy: f64) -> Self {
    self.x += dx;
    self.y += dy;
    self
  }

  /// Negative scales are clamped to zero.
  pub fn with_scale(mut self, scale: f64) -> Self {
    self.scale = scale.max(0.0);
    self
  }

  /// Rotation normalised into `[0, 360)`.
  pub fn with_rotation(mut self, degrees: f64) -> Self {
    self.rotation = degrees.rem_euclid(360.0);
    self
  }

  pub fn with_z(mut self, z: f64) -> Self {
    self.z = z;
    self
  }
}
