//! Items: the things placed on a board.
//!
//! Every item is a [`Transform`] plus one of a closed set of payload variants
//! ([`ItemData`]). The variant's discriminant string is the `type` column of
//! the archive; its payload is serialised to the `data` JSON column, and
//! images additionally keep their encoded bytes in the archive's blob table.

pub mod gif;
pub mod pixmap;
pub mod text;
pub mod transform;

use std::{fmt, path::Path};

use serde::{Deserialize as _, de::DeserializeOwned};
use uuid::Uuid;

pub use gif::GifData;
pub use pixmap::PixmapData;
pub use text::{DrawData, ErrorData, FontSpec, PenStyle, TextData};
pub use transform::{Flip, Point, Rect, Transform};

use crate::{Error, Result};

/// Appended to the text of placeholders for images that failed to load.
pub const IMG_LOADING_ERROR_MSG: &str =
  "Unknown format or too big?\nCheck Settings -> Images & Items -> Maximum Image Size";

// ─── ItemId ──────────────────────────────────────────────────────────────────

/// Process-local identity of an item. Unlike the save id this exists from the
/// moment an item is created and is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(Uuid);

impl ItemId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for ItemId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for ItemId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

// ─── ItemKind ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
  Pixmap,
  Text,
  Draw,
  Gif,
  Error,
}

impl ItemKind {
  pub const ALL: [ItemKind; 5] =
    [Self::Pixmap, Self::Text, Self::Draw, Self::Gif, Self::Error];

  /// The discriminant stored in the `type` column.
  pub fn type_tag(self) -> &'static str {
    match self {
      Self::Pixmap => "pixmap",
      Self::Text => "text",
      Self::Draw => "draw",
      Self::Gif => "gif",
      Self::Error => "error",
    }
  }

  pub fn from_tag(tag: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|kind| kind.type_tag() == tag)
      .ok_or_else(|| Error::UnknownItemType(tag.to_owned()))
  }

  /// Whether rows of this kind keep their data in the blob table.
  pub fn has_binary_payload(self) -> bool {
    matches!(self, Self::Pixmap | Self::Gif)
  }
}

// ─── ItemData ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ItemData {
  Pixmap(PixmapData),
  Text(TextData),
  Draw(DrawData),
  Gif(GifData),
  Error(ErrorData),
}

impl ItemData {
  pub fn kind(&self) -> ItemKind {
    match self {
      Self::Pixmap(_) => ItemKind::Pixmap,
      Self::Text(_) => ItemKind::Text,
      Self::Draw(_) => ItemKind::Draw,
      Self::Gif(_) => ItemKind::Gif,
      Self::Error(_) => ItemKind::Error,
    }
  }
}

// ─── ItemRecord ──────────────────────────────────────────────────────────────

/// One archive row after column decoding but before the payload has been
/// interpreted.
#[derive(Debug, Clone)]
pub struct ItemRecord {
  pub save_id:   Option<i64>,
  pub type_tag:  String,
  pub transform: Transform,
  pub data:      serde_json::Value,
  pub blob:      Option<Vec<u8>>,
}

impl ItemRecord {
  /// The `filename` field of the payload, if there is one.
  pub fn filename_hint(&self) -> Option<&str> {
    self.data.get("filename").and_then(serde_json::Value::as_str)
  }

  /// Human-readable text for the placeholder that replaces this row when it
  /// can't be decoded.
  pub fn load_error_text(&self) -> String {
    let name = self
      .filename_hint()
      .map(str::to_owned)
      .or_else(|| self.save_id.map(|id| format!("#{id}")))
      .unwrap_or_default();
    match ItemKind::from_tag(&self.type_tag) {
      Ok(kind) if kind.has_binary_payload() => {
        format!("Image could not be loaded: {name}\n{IMG_LOADING_ERROR_MSG}")
      }
      _ => format!("Item could not be loaded: {name} ({})", self.type_tag),
    }
  }
}

// ─── Item ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Item {
  id:            ItemId,
  /// Row id in the archive; `None` until the item is saved for the first
  /// time.
  pub save_id:   Option<i64>,
  pub transform: Transform,
  pub data:      ItemData,
}

impl Item {
  pub fn new(data: ItemData) -> Self {
    Self { id: ItemId::new(), save_id: None, transform: Transform::default(), data }
  }

  pub fn with_transform(mut self, transform: Transform) -> Self {
    self.transform = transform;
    self
  }

  pub fn pixmap(data: PixmapData) -> Self { Self::new(ItemData::Pixmap(data)) }

  pub fn text(text: impl Into<String>) -> Self {
    Self::new(ItemData::Text(TextData::new(text)))
  }

  pub fn draw(data: DrawData) -> Self { Self::new(ItemData::Draw(data)) }

  pub fn gif(data: GifData) -> Self { Self::new(ItemData::Gif(data)) }

  /// An item for encoded image bytes: animated if they are a GIF, still
  /// otherwise.
  pub fn image(bytes: Vec<u8>, filename: Option<String>) -> Result<Self> {
    if image::guess_format(&bytes)? == image::ImageFormat::Gif {
      Ok(Self::gif(GifData::from_bytes(bytes, filename)?))
    } else {
      Ok(Self::pixmap(PixmapData::from_bytes(bytes, filename)?))
    }
  }

  /// A placeholder standing in for the row `original_save_id`.
  pub fn error_placeholder(
    text: impl Into<String>,
    original_save_id: Option<i64>,
    transform: Transform,
  ) -> Self {
    Self {
      id:        ItemId::new(),
      save_id:   None,
      transform: Transform { flip: Flip::Normal, ..transform },
      data:      ItemData::Error(ErrorData { text: text.into(), original_save_id }),
    }
  }

  pub fn id(&self) -> ItemId { self.id }

  pub fn kind(&self) -> ItemKind { self.data.kind() }

  pub fn type_tag(&self) -> &'static str { self.kind().type_tag() }

  /// Error placeholders are never written to an archive.
  pub fn is_persistable(&self) -> bool { self.kind() != ItemKind::Error }

  pub fn is_image(&self) -> bool { self.kind().has_binary_payload() }

  /// The row an error placeholder protects from deletion.
  pub fn original_save_id(&self) -> Option<i64> {
    match &self.data {
      ItemData::Error(err) => err.original_save_id,
      _ => None,
    }
  }

  pub fn filename(&self) -> Option<&str> {
    match &self.data {
      ItemData::Pixmap(p) => p.filename.as_deref(),
      ItemData::Gif(g) => g.filename.as_deref(),
      _ => None,
    }
  }

  /// Encoded image bytes for the blob table.
  pub fn binary_payload(&self) -> Option<&[u8]> {
    match &self.data {
      ItemData::Pixmap(p) => Some(p.bytes()),
      ItemData::Gif(g) => Some(g.bytes()),
      _ => None,
    }
  }

  /// File extension matching [`Item::binary_payload`].
  pub fn image_format(&self) -> Option<&'static str> {
    match &self.data {
      ItemData::Pixmap(p) => Some(p.extension()),
      ItemData::Gif(_) => Some("gif"),
      _ => None,
    }
  }

  // ── Flip ──────────────────────────────────────────────────────────────

  /// Error placeholders always report [`Flip::Normal`].
  pub fn flip(&self) -> Flip {
    match self.data {
      ItemData::Error(_) => Flip::Normal,
      _ => self.transform.flip,
    }
  }

  /// Mirror horizontally. A no-op for error placeholders.
  pub fn do_flip(&mut self) {
    if !matches!(self.data, ItemData::Error(_)) {
      self.transform.flip = self.transform.flip.toggled();
    }
  }

  // ── Serialisation ─────────────────────────────────────────────────────

  /// The type-specific fields stored in the `data` column.
  pub fn get_extra_save_data(&self) -> Result<serde_json::Value> {
    Ok(match &self.data {
      ItemData::Pixmap(p) => serde_json::to_value(p.payload())?,
      ItemData::Text(t) => serde_json::to_value(t)?,
      ItemData::Draw(d) => serde_json::to_value(d)?,
      ItemData::Gif(g) => serde_json::to_value(g.payload())?,
      ItemData::Error(e) => serde_json::json!({ "text": e.text }),
    })
  }

  /// Finish a transient item (geometry and binary data already in place)
  /// with the payload read from the `data` column. Fields missing from
  /// `data` keep their defaults.
  pub fn create_from_item_and_data(
    mut item: Item,
    data: &serde_json::Value,
  ) -> Result<Item> {
    match &mut item.data {
      ItemData::Pixmap(p) => p.apply_payload(parse_payload(data)?),
      ItemData::Gif(g) => g.apply_payload(parse_payload(data)?),
      ItemData::Text(t) => *t = parse_payload(data)?,
      ItemData::Draw(d) => *d = parse_payload(data)?,
      ItemData::Error(e) => {
        if let Some(text) = data.get("text").and_then(serde_json::Value::as_str) {
          e.text = text.to_owned();
        }
        item.transform.flip = Flip::Normal;
      }
    }
    Ok(item)
  }

  /// Decode an archive row into an item.
  ///
  /// Fails when the type tag is unknown, the payload is malformed, or the
  /// stored image bytes can't be decoded; callers substitute a placeholder.
  pub fn from_record(record: &ItemRecord) -> Result<Item> {
    let kind = ItemKind::from_tag(&record.type_tag)?;
    let filename = record.filename_hint().map(str::to_owned);
    let data = match kind {
      ItemKind::Pixmap => {
        let blob = record.blob.as_deref().ok_or(Error::NotAnImage("pixmap"))?;
        ItemData::Pixmap(PixmapData::from_bytes(blob, filename)?)
      }
      ItemKind::Gif => {
        let blob = record.blob.as_deref().ok_or(Error::NotAnImage("gif"))?;
        ItemData::Gif(GifData::from_bytes(blob, filename)?)
      }
      ItemKind::Text => ItemData::Text(TextData::default()),
      ItemKind::Draw => ItemData::Draw(DrawData::default()),
      ItemKind::Error => ItemData::Error(ErrorData {
        text:             String::new(),
        original_save_id: record.save_id,
      }),
    };

    let transient = Item {
      id: ItemId::new(),
      save_id: if kind == ItemKind::Error { None } else { record.save_id },
      transform: record.transform,
      data,
    };
    Item::create_from_item_and_data(transient, &record.data)
  }

  /// `"{save_id:04}-{basename}.{format}"` when the item came from a file,
  /// `"{save_id:04}.{format}"` otherwise. `default_id` is used for items
  /// that haven't been saved yet.
  pub fn get_filename_for_export(
    &self,
    format: &str,
    default_id: Option<i64>,
  ) -> Result<String> {
    let save_id = self.save_id.or(default_id).ok_or(Error::MissingSaveId)?;
    let basename = self
      .filename()
      .and_then(|name| Path::new(name).file_stem())
      .map(|stem| stem.to_string_lossy().into_owned());

    Ok(match basename {
      Some(base) => format!("{save_id:04}-{base}.{format}"),
      None => format!("{save_id:04}.{format}"),
    })
  }

  /// An unsaved duplicate with a fresh identity.
  pub fn create_copy(&self) -> Item {
    let mut copy = self.clone();
    copy.id = ItemId::new();
    copy.save_id = None;
    if let ItemData::Error(err) = &mut copy.data {
      err.original_save_id = None;
    }
    copy
  }
}

impl fmt::Display for Item {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.data {
      ItemData::Pixmap(p) => write!(
        f,
        "Image {:?} {} x {}",
        p.filename.as_deref().unwrap_or(""),
        p.width(),
        p.height()
      ),
      ItemData::Gif(g) => write!(
        f,
        "GIF {:?} {} x {}, {} frames",
        g.filename.as_deref().unwrap_or(""),
        g.width(),
        g.height(),
        g.frame_count()
      ),
      ItemData::Text(t) => write!(f, "Text {:?}", truncated(&t.text)),
      ItemData::Draw(d) => write!(f, "Drawing ({} points)", d.path.len()),
      ItemData::Error(e) => write!(f, "Error {:?}", truncated(&e.text)),
    }
  }
}

fn truncated(text: &str) -> String { text.chars().take(40).collect() }

fn parse_payload<T: DeserializeOwned>(data: &serde_json::Value) -> Result<T> {
  // A NULL column behaves like an empty object.
  if data.is_null() {
    return Ok(T::deserialize(&serde_json::json!({}))?);
  }
  Ok(T::deserialize(data)?)
}

// ─── Ordering ────────────────────────────────────────────────────────────────

/// Items with a filename first (by filename), then items with a save id (by
/// save id), then the rest in their given order.
pub fn sort_by_filename<'a, I>(items: I) -> Vec<&'a Item>
where
  I: IntoIterator<Item = &'a Item>,
{
  let mut by_filename = Vec::new();
  let mut by_save_id = Vec::new();
  let mut remaining = Vec::new();

  for item in items {
    if item.filename().is_some_and(|name| !name.is_empty()) {
      by_filename.push(item);
    } else if item.save_id.is_some() {
      by_save_id.push(item);
    } else {
      remaining.push(item);
    }
  }

  by_filename.sort_by(|a, b| a.filename().cmp(&b.filename()));
  by_save_id.sort_by_key(|item| item.save_id);
  by_filename.into_iter().chain(by_save_id).chain(remaining).collect()
}
