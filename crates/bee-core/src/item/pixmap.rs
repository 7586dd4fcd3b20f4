//! Still images.

use std::{fmt, sync::Arc};

use image::{GenericImageView as _, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, item::transform::Rect};

/// File extension used when storing or exporting bytes of the given format.
pub fn format_extension(format: ImageFormat) -> &'static str {
  match format {
    ImageFormat::Png => "png",
    ImageFormat::Jpeg => "jpg",
    ImageFormat::Gif => "gif",
    other => other.extensions_str().first().copied().unwrap_or("bin"),
  }
}

// ─── PixmapData ──────────────────────────────────────────────────────────────

/// An image placed on the board.
///
/// The encoded bytes are kept exactly as they were inserted and are shared
/// between copies; they never change once the item exists.
#[derive(Clone)]
pub struct PixmapData {
  bytes:         Arc<[u8]>,
  format:        ImageFormat,
  width:         u32,
  height:        u32,
  crop:          Rect,
  /// The file the image was originally loaded from, if any.
  pub filename:  Option<String>,
  pub grayscale: bool,
  pub opacity:   f64,
}

impl PixmapData {
  /// Decode `bytes` to validate them and learn the image dimensions.
  pub fn from_bytes(
    bytes: impl Into<Arc<[u8]>>,
    filename: Option<String>,
  ) -> Result<Self> {
    let bytes = bytes.into();
    let format = image::guess_format(&bytes)?;
    let (width, height) = image::load_from_memory_with_format(&bytes, format)?
      .dimensions();

    Ok(Self {
      bytes,
      format,
      width,
      height,
      crop: Rect::new(0.0, 0.0, f64::from(width), f64::from(height)),
      filename,
      grayscale: false,
      opacity: 1.0,
    })
  }

  pub fn bytes(&self) -> &[u8] { &self.bytes }

  pub fn format(&self) -> ImageFormat { self.format }

  pub fn extension(&self) -> &'static str { format_extension(self.format) }

  pub fn width(&self) -> u32 { self.width }

  pub fn height(&self) -> u32 { self.height }

  pub fn bounds(&self) -> Rect {
    Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
  }

  pub fn crop(&self) -> Rect { self.crop }

  /// Clamp `rect` to the image bounds. Fails when nothing would remain
  /// visible.
  pub fn clamp_crop(&self, rect: Rect) -> Result<Rect> {
    if !rect.x.is_finite()
      || !rect.y.is_finite()
      || !rect.width.is_finite()
      || !rect.height.is_finite()
    {
      return Err(Error::InvalidCrop(format!("{rect:?} is not finite")));
    }
    let clamped = rect.intersected(&self.bounds());
    if clamped.is_empty() {
      return Err(Error::InvalidCrop(format!(
        "{rect:?} lies outside the {}x{} image",
        self.width, self.height
      )));
    }
    Ok(clamped)
  }

  /// Set an already validated crop rectangle.
  pub fn set_crop(&mut self, rect: Rect) { self.crop = rect; }

  pub fn reset_crop(&mut self) { self.crop = self.bounds(); }

  pub(crate) fn apply_payload(&mut self, payload: PixmapPayload) {
    // A filename known from elsewhere wins over the stored one.
    if self.filename.is_none() {
      self.filename = payload.filename;
    }
    self.opacity = payload.opacity;
    self.grayscale = payload.grayscale;
    // Stored crops get the same clamping as interactive ones; one that leaves
    // nothing visible shows the whole image.
    self.crop = payload
      .crop
      .and_then(|crop| self.clamp_crop(Rect::from_array(crop)).ok())
      .unwrap_or_else(|| self.bounds());
  }

  pub(crate) fn payload(&self) -> PixmapPayload {
    PixmapPayload {
      filename:  self.filename.clone(),
      opacity:   self.opacity,
      grayscale: self.grayscale,
      crop:      Some(self.crop.to_array()),
    }
  }
}

impl fmt::Debug for PixmapData {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PixmapData")
      .field("len", &self.bytes.len())
      .field("format", &self.format)
      .field("size", &(self.width, self.height))
      .field("crop", &self.crop)
      .field("filename", &self.filename)
      .field("grayscale", &self.grayscale)
      .field("opacity", &self.opacity)
      .finish()
  }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// The JSON stored in `items.data` for pixmaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PixmapPayload {
  #[serde(default)]
  pub filename:  Option<String>,
  #[serde(default = "full_opacity")]
  pub opacity:   f64,
  #[serde(default)]
  pub grayscale: bool,
  /// `[x, y, width, height]`; absent means the whole image.
  #[serde(default)]
  pub crop:      Option<[f64; 4]>,
}

pub(crate) fn full_opacity() -> f64 { 1.0 }
