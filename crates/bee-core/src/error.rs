//! Error types for `bee-core`.

use thiserror::Error;

use crate::item::ItemId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("item not found: {0}")]
  ItemNotFound(ItemId),

  #[error("unknown item type discriminant: {0:?}")]
  UnknownItemType(String),

  #[error("item has no save id and no fallback id was given")]
  MissingSaveId,

  #[error("invalid crop rectangle: {0}")]
  InvalidCrop(String),

  #[error("animation contains no frames")]
  EmptyAnimation,

  #[error("expected a {expected} item, found {found}")]
  WrongItemType { expected: &'static str, found: &'static str },

  #[error("item of type {0:?} carries no image data")]
  NotAnImage(&'static str),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("image error: {0}")]
  Image(#[from] image::ImageError),

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
