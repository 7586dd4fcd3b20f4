//! Animated GIFs.

use std::{fmt, io::Cursor, sync::Arc};

use image::{AnimationDecoder as _, codecs::gif::GifDecoder};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, item::pixmap::full_opacity};

/// An animated GIF placed on the board. Playback state is a UI concern; only
/// the frame on display is part of the document.
#[derive(Clone)]
pub struct GifData {
  bytes:         Arc<[u8]>,
  frame_count:   usize,
  width:         u32,
  height:        u32,
  current_frame: usize,
  pub filename:  Option<String>,
  pub opacity:   f64,
}

impl GifData {
  /// Decode every frame of `bytes`; any broken frame fails the whole GIF.
  pub fn from_bytes(
    bytes: impl Into<Arc<[u8]>>,
    filename: Option<String>,
  ) -> Result<Self> {
    let bytes = bytes.into();
    let decoder = GifDecoder::new(Cursor::new(&bytes[..]))?;
    let mut frame_count = 0;
    let mut size = (0, 0);
    for frame in decoder.into_frames() {
      let frame = frame?;
      if frame_count == 0 {
        size = frame.buffer().dimensions();
      }
      frame_count += 1;
    }
    if frame_count == 0 {
      return Err(Error::EmptyAnimation);
    }

    Ok(Self {
      bytes,
      frame_count,
      width: size.0,
      height: size.1,
      current_frame: 0,
      filename,
      opacity: 1.0,
    })
  }

  pub fn bytes(&self) -> &[u8] { &self.bytes }

  pub fn frame_count(&self) -> usize { self.frame_count }

  pub fn width(&self) -> u32 { self.width }

  pub fn height(&self) -> u32 { self.height }

  pub fn current_frame(&self) -> usize { self.current_frame }

  /// Frames outside the animation are clamped to the last frame.
  pub fn set_current_frame(&mut self, frame: usize) {
    self.current_frame = frame.min(self.frame_count.saturating_sub(1));
  }

  pub fn next_frame(&mut self) {
    if self.frame_count > 0 {
      self.current_frame = (self.current_frame + 1) % self.frame_count;
    }
  }

  pub fn previous_frame(&mut self) {
    if self.frame_count > 0 {
      self.current_frame =
        (self.current_frame + self.frame_count - 1) % self.frame_count;
    }
  }

  pub(crate) fn apply_payload(&mut self, payload: GifPayload) {
    if self.filename.is_none() {
      self.filename = payload.filename;
    }
    self.opacity = payload.opacity;
    self.set_current_frame(payload.current_frame);
  }

  pub(crate) fn payload(&self) -> GifPayload {
    GifPayload {
      filename:      self.filename.clone(),
      opacity:       self.opacity,
      current_frame: self.current_frame,
    }
  }
}

impl fmt::Debug for GifData {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("GifData")
      .field("len", &self.bytes.len())
      .field("frames", &self.frame_count)
      .field("size", &(self.width, self.height))
      .field("current_frame", &self.current_frame)
      .field("filename", &self.filename)
      .field("opacity", &self.opacity)
      .finish()
  }
}

/// The JSON stored in `items.data` for GIFs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GifPayload {
  #[serde(default)]
  pub filename:      Option<String>,
  #[serde(default = "full_opacity")]
  pub opacity:       f64,
  #[serde(default)]
  pub current_frame: usize,
}
