//! Undo/redo.
//!
//! A [`Command`] captures enough state to apply and revert one change to the
//! scene. Constructors validate their input (and clamp where that makes
//! sense) so that applying a command can never fail halfway; a command that
//! finds one of its items missing skips it.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::{
  Error, Result,
  item::{Item, ItemData, ItemId, Rect, Transform},
  scene::ItemSet,
};

// ─── Command ─────────────────────────────────────────────────────────────────

/// Before and after geometry of one item.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformChange {
  pub id:     ItemId,
  pub before: Transform,
  pub after:  Transform,
}

#[derive(Debug)]
pub enum Command {
  /// Add new items. While undone, the items are held by the command.
  InsertItems { stash: Vec<Item>, ids: Vec<ItemId> },
  /// Remove items, remembering where they sat in the scene.
  DeleteItems { ids: Vec<ItemId>, stash: Vec<(usize, Item)> },
  /// Any change of position, scale, rotation or z-order.
  TransformItems { label: &'static str, changes: Vec<TransformChange> },
  /// Horizontal mirror; its own inverse.
  FlipItems { ids: Vec<ItemId> },
  CropItem { id: ItemId, before: Rect, after: Rect },
  ChangeText { id: ItemId, before: String, after: String },
  ChangeOpacity { changes: Vec<(ItemId, f64, f64)> },
  ToggleGrayscale { changes: Vec<(ItemId, bool)>, value: bool },
  /// Several commands undone and redone as one step.
  Batch { label: String, commands: Vec<Command> },
}

impl Command {
  // ── Constructors ──────────────────────────────────────────────────────

  pub fn insert_items(items: Vec<Item>) -> Self {
    let ids = items.iter().map(Item::id).collect();
    Self::InsertItems { stash: items, ids }
  }

  pub fn delete_items(ids: Vec<ItemId>) -> Self {
    Self::DeleteItems { ids, stash: Vec::new() }
  }

  /// Snapshot the current transform of each item in `ids` and the result of
  /// `f` applied to it. Items not in the scene are left out.
  pub fn transform_items(
    label: &'static str,
    items: &ItemSet,
    ids: &[ItemId],
    f: impl Fn(Transform) -> Transform,
  ) -> Self {
    let changes = ids
      .iter()
      .filter_map(|&id| items.get(id))
      .map(|item| TransformChange {
        id:     item.id(),
        before: item.transform,
        after:  f(item.transform),
      })
      .collect();
    Self::TransformItems { label, changes }
  }

  pub fn move_items(items: &ItemSet, ids: &[ItemId], dx: f64, dy: f64) -> Self {
    Self::transform_items("Move items", items, ids, |t| t.moved_by(dx, dy))
  }

  pub fn scale_items(items: &ItemSet, ids: &[ItemId], factor: f64) -> Self {
    Self::transform_items("Scale items", items, ids, |t| {
      let scale = t.scale * factor;
      t.with_scale(scale)
    })
  }

  pub fn rotate_items(items: &ItemSet, ids: &[ItemId], degrees: f64) -> Self {
    Self::transform_items("Rotate items", items, ids, |t| {
      let rotation = t.rotation + degrees;
      t.with_rotation(rotation)
    })
  }

  pub fn reset_scale(items: &ItemSet, ids: &[ItemId]) -> Self {
    Self::transform_items("Reset scale", items, ids, |t| t.with_scale(1.0))
  }

  pub fn reset_rotation(items: &ItemSet, ids: &[ItemId]) -> Self {
    Self::transform_items("Reset rotation", items, ids, |t| t.with_rotation(0.0))
  }

  /// Stack `ids` above every other item, keeping their relative order.
  pub fn raise_to_top(items: &ItemSet, ids: &[ItemId]) -> Self {
    let top = items.iter().map(|i| i.transform.z).fold(0.0, f64::max);
    let base = ids
      .iter()
      .filter_map(|&id| items.get(id))
      .map(|i| i.transform.z)
      .fold(f64::INFINITY, f64::min);
    let offset = if base.is_finite() { top - base + 1.0 } else { 0.0 };
    Self::transform_items("Raise to top", items, ids, |t| {
      let z = t.z + offset;
      t.with_z(z)
    })
  }

  pub fn flip_items(ids: Vec<ItemId>) -> Self { Self::FlipItems { ids } }

  /// Crop a pixmap. `rect` is clamped to the image; a crop that leaves
  /// nothing visible is rejected.
  pub fn crop(items: &ItemSet, id: ItemId, rect: Rect) -> Result<Self> {
    let item = items.get(id).ok_or(Error::ItemNotFound(id))?;
    let ItemData::Pixmap(pixmap) = &item.data else {
      return Err(Error::WrongItemType { expected: "pixmap", found: item.type_tag() });
    };
    let after = pixmap.clamp_crop(rect)?;
    Ok(Self::CropItem { id, before: pixmap.crop(), after })
  }

  pub fn change_text(
    items: &ItemSet,
    id: ItemId,
    text: impl Into<String>,
  ) -> Result<Self> {
    let item = items.get(id).ok_or(Error::ItemNotFound(id))?;
    let ItemData::Text(data) = &item.data else {
      return Err(Error::WrongItemType { expected: "text", found: item.type_tag() });
    };
    Ok(Self::ChangeText { id, before: data.text.clone(), after: text.into() })
  }

  /// Opacity is clamped to `0.0..=1.0`; items without opacity are skipped.
  pub fn change_opacity(items: &ItemSet, ids: &[ItemId], opacity: f64) -> Self {
    let value = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    let changes = ids
      .iter()
      .filter_map(|&id| items.get(id))
      .filter_map(|item| opacity_of(item).map(|before| (item.id(), before, value)))
      .collect();
    Self::ChangeOpacity { changes }
  }

  /// Only pixmaps can be shown in grayscale; other items are skipped.
  pub fn toggle_grayscale(items: &ItemSet, ids: &[ItemId], value: bool) -> Self {
    let changes = ids
      .iter()
      .filter_map(|&id| items.get(id))
      .filter_map(|item| match &item.data {
        ItemData::Pixmap(p) => Some((item.id(), p.grayscale)),
        _ => None,
      })
      .collect();
    Self::ToggleGrayscale { changes, value }
  }

  pub fn batch(label: impl Into<String>, commands: Vec<Command>) -> Self {
    Self::Batch { label: label.into(), commands }
  }

  // ── Description ───────────────────────────────────────────────────────

  pub fn text(&self) -> &str {
    match self {
      Self::InsertItems { .. } => "Insert items",
      Self::DeleteItems { .. } => "Delete items",
      Self::TransformItems { label, .. } => *label,
      Self::FlipItems { .. } => "Flip items",
      Self::CropItem { .. } => "Crop",
      Self::ChangeText { .. } => "Change text",
      Self::ChangeOpacity { .. } => "Change opacity",
      Self::ToggleGrayscale { .. } => "Grayscale",
      Self::Batch { label, .. } => label.as_str(),
    }
  }

  // ── Application ───────────────────────────────────────────────────────

  pub(crate) fn redo(&mut self, items: &mut ItemSet) {
    match self {
      Self::InsertItems { stash, .. } => {
        for item in stash.drain(..) {
          items.insert(item);
        }
      }
      Self::DeleteItems { ids, stash } => {
        for &id in ids.iter() {
          match items.remove_indexed(id) {
            Some(entry) => stash.push(entry),
            None => warn!(%id, "cannot delete item that is not in the scene"),
          }
        }
      }
      Self::TransformItems { changes, .. } => {
        for change in changes.iter() {
          with_item(items, change.id, |item| item.transform = change.after);
        }
      }
      Self::FlipItems { ids } => {
        for &id in ids.iter() {
          with_item(items, id, Item::do_flip);
        }
      }
      Self::CropItem { id, after, .. } => set_crop(items, *id, *after),
      Self::ChangeText { id, after, .. } => set_text(items, *id, after),
      Self::ChangeOpacity { changes } => {
        for &(id, _, after) in changes.iter() {
          with_item(items, id, |item| set_opacity(item, after));
        }
      }
      Self::ToggleGrayscale { changes, value } => {
        for &(id, _) in changes.iter() {
          with_item(items, id, |item| set_grayscale(item, *value));
        }
      }
      Self::Batch { commands, .. } => {
        for command in commands.iter_mut() {
          command.redo(items);
        }
      }
    }
  }

  pub(crate) fn undo(&mut self, items: &mut ItemSet) {
    match self {
      Self::InsertItems { stash, ids } => {
        for &id in ids.iter() {
          if let Some(item) = items.remove(id) {
            stash.push(item);
          }
        }
      }
      Self::DeleteItems { stash, .. } => {
        // Reinsert in reverse so the recorded indices are valid again.
        while let Some((index, item)) = stash.pop() {
          items.insert_at(index, item);
        }
      }
      Self::TransformItems { changes, .. } => {
        for change in changes.iter().rev() {
          with_item(items, change.id, |item| item.transform = change.before);
        }
      }
      Self::FlipItems { ids } => {
        for &id in ids.iter().rev() {
          with_item(items, id, Item::do_flip);
        }
      }
      Self::CropItem { id, before, .. } => set_crop(items, *id, *before),
      Self::ChangeText { id, before, .. } => set_text(items, *id, before),
      Self::ChangeOpacity { changes } => {
        for &(id, before, _) in changes.iter().rev() {
          with_item(items, id, |item| set_opacity(item, before));
        }
      }
      Self::ToggleGrayscale { changes, .. } => {
        for &(id, before) in changes.iter().rev() {
          with_item(items, id, |item| set_grayscale(item, before));
        }
      }
      Self::Batch { commands, .. } => {
        for command in commands.iter_mut().rev() {
          command.undo(items);
        }
      }
    }
  }

  /// Visit the items this command holds while they are out of the scene.
  fn for_each_stashed(&mut self, f: &mut dyn FnMut(&mut Item)) {
    match self {
      Self::InsertItems { stash, .. } => {
        for item in stash.iter_mut() {
          f(item);
        }
      }
      Self::DeleteItems { stash, .. } => {
        for (_, item) in stash.iter_mut() {
          f(item);
        }
      }
      Self::Batch { commands, .. } => {
        for command in commands.iter_mut() {
          command.for_each_stashed(f);
        }
      }
      _ => {}
    }
  }
}

fn with_item(items: &mut ItemSet, id: ItemId, f: impl FnOnce(&mut Item)) {
  match items.get_mut(id) {
    Some(item) => f(item),
    None => debug!(%id, "command target is no longer in the scene"),
  }
}

fn set_crop(items: &mut ItemSet, id: ItemId, rect: Rect) {
  with_item(items, id, |item| {
    if let ItemData::Pixmap(p) = &mut item.data {
      p.set_crop(rect);
    }
  });
}

fn set_text(items: &mut ItemSet, id: ItemId, text: &str) {
  with_item(items, id, |item| {
    if let ItemData::Text(t) = &mut item.data {
      t.text = text.to_owned();
    }
  });
}

fn opacity_of(item: &Item) -> Option<f64> {
  match &item.data {
    ItemData::Pixmap(p) => Some(p.opacity),
    ItemData::Gif(g) => Some(g.opacity),
    _ => None,
  }
}

fn set_opacity(item: &mut Item, value: f64) {
  match &mut item.data {
    ItemData::Pixmap(p) => p.opacity = value,
    ItemData::Gif(g) => g.opacity = value,
    _ => {}
  }
}

fn set_grayscale(item: &mut Item, value: bool) {
  if let ItemData::Pixmap(p) = &mut item.data {
    p.grayscale = value;
  }
}

// ─── CommandLog ──────────────────────────────────────────────────────────────

/// Linear undo history with a fixed capacity.
///
/// `index` is the number of applied entries; everything from `index` on is
/// the redo tail. `clean_index` is the position that matches the last save,
/// or `None` once that position has been discarded.
#[derive(Debug)]
pub struct CommandLog {
  entries:     VecDeque<Command>,
  index:       usize,
  limit:       usize,
  clean_index: Option<usize>,
}

impl Default for CommandLog {
  fn default() -> Self { Self::new(crate::scene::DEFAULT_UNDO_LIMIT) }
}

impl CommandLog {
  /// A limit of zero is treated as one.
  pub fn new(limit: usize) -> Self {
    Self {
      entries: VecDeque::new(),
      index: 0,
      limit: limit.max(1),
      clean_index: Some(0),
    }
  }

  /// Apply `command` and append it, dropping any redo tail and, past the
  /// limit, the oldest entry.
  pub fn push(&mut self, mut command: Command, items: &mut ItemSet) {
    debug!(command = command.text(), "push");
    command.redo(items);

    self.entries.truncate(self.index);
    if self.clean_index.is_some_and(|clean| clean > self.index) {
      self.clean_index = None;
    }
    self.entries.push_back(command);
    self.index += 1;

    if self.entries.len() > self.limit {
      self.entries.pop_front();
      self.index -= 1;
      self.clean_index = self.clean_index.and_then(|clean| clean.checked_sub(1));
    }
  }

  pub fn undo(&mut self, items: &mut ItemSet) {
    if self.index == 0 {
      return;
    }
    self.index -= 1;
    let command = &mut self.entries[self.index];
    debug!(command = command.text(), "undo");
    command.undo(items);
  }

  pub fn redo(&mut self, items: &mut ItemSet) {
    let Some(command) = self.entries.get_mut(self.index) else {
      return;
    };
    debug!(command = command.text(), "redo");
    command.redo(items);
    self.index += 1;
  }

  pub fn can_undo(&self) -> bool { self.index > 0 }

  pub fn can_redo(&self) -> bool { self.index < self.entries.len() }

  pub fn undo_text(&self) -> Option<&str> {
    self.index.checked_sub(1).map(|i| self.entries[i].text())
  }

  pub fn redo_text(&self) -> Option<&str> {
    self.entries.get(self.index).map(Command::text)
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn limit(&self) -> usize { self.limit }

  pub fn is_clean(&self) -> bool { self.clean_index == Some(self.index) }

  pub fn mark_clean(&mut self) { self.clean_index = Some(self.index); }

  /// Visit every item held by the log rather than by the scene: deleted
  /// items waiting for undo and undone inserts waiting for redo.
  pub fn for_each_stashed_item(&mut self, mut f: impl FnMut(&mut Item)) {
    for command in self.entries.iter_mut() {
      command.for_each_stashed(&mut f);
    }
  }

  pub fn clear(&mut self) {
    self.entries.clear();
    self.index = 0;
    self.clean_index = Some(0);
  }
}
