//! The scene: the live set of items on a board.
//!
//! The scene is owned by the interactive thread. The only part of it that
//! crosses threads is the [`LoadQueue`]: background loads push decoded items
//! into it and the interactive thread moves them into the live set with
//! [`Scene::add_queued_items`] whenever it is ready to show them.

use std::{
  collections::{BTreeSet, VecDeque},
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::debug;

use crate::{
  command::{Command, CommandLog},
  item::{Item, ItemData, ItemId, ItemKind},
};

pub const DEFAULT_UNDO_LIMIT: usize = 100;

// ─── ItemSet ─────────────────────────────────────────────────────────────────

/// Live items in insertion order. Commands mutate the scene through this.
#[derive(Debug, Default)]
pub struct ItemSet {
  items: Vec<Item>,
}

impl ItemSet {
  pub fn len(&self) -> usize { self.items.len() }

  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = &Item> { self.items.iter() }

  pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Item> {
    self.items.iter_mut()
  }

  pub fn contains(&self, id: ItemId) -> bool { self.get(id).is_some() }

  pub fn get(&self, id: ItemId) -> Option<&Item> {
    self.items.iter().find(|item| item.id() == id)
  }

  pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
    self.items.iter_mut().find(|item| item.id() == id)
  }

  /// Inserting an item that is already present is a no-op.
  pub fn insert(&mut self, item: Item) {
    if !self.contains(item.id()) {
      self.items.push(item);
    }
  }

  pub fn remove(&mut self, id: ItemId) -> Option<Item> {
    self.remove_indexed(id).map(|(_, item)| item)
  }

  /// Remove an item along with the position it occupied.
  pub fn remove_indexed(&mut self, id: ItemId) -> Option<(usize, Item)> {
    let index = self.items.iter().position(|item| item.id() == id)?;
    Some((index, self.items.remove(index)))
  }

  /// Insert at `index`, or at the end when `index` is out of range.
  pub fn insert_at(&mut self, index: usize, item: Item) {
    if self.contains(item.id()) {
      return;
    }
    let index = index.min(self.items.len());
    self.items.insert(index, item);
  }

  fn clear(&mut self) { self.items.clear(); }
}

// ─── LoadQueue ───────────────────────────────────────────────────────────────

/// Decoded items waiting to be shown. Cloning yields another handle to the
/// same queue.
#[derive(Debug, Clone, Default)]
pub struct LoadQueue {
  inner: Arc<Mutex<VecDeque<Item>>>,
}

impl LoadQueue {
  pub fn push(&self, item: Item) { self.lock().push_back(item); }

  pub fn len(&self) -> usize { self.lock().len() }

  pub fn is_empty(&self) -> bool { self.lock().is_empty() }

  /// Take everything queued so far, oldest first.
  pub fn drain(&self) -> Vec<Item> { self.lock().drain(..).collect() }

  fn clear(&self) { self.lock().clear(); }

  fn lock(&self) -> MutexGuard<'_, VecDeque<Item>> {
    // A panic while holding the lock can't leave the deque half-updated.
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

// ─── SaveSnapshot ────────────────────────────────────────────────────────────

/// What a save needs from the scene, detached so it can travel to a worker.
#[derive(Debug, Clone, Default)]
pub struct SaveSnapshot {
  /// Persistable items in save order.
  pub items:     Vec<Item>,
  /// Rows that must survive the save because an error placeholder stands in
  /// for them.
  pub protected: BTreeSet<i64>,
}

// ─── Scene ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Scene {
  items:     ItemSet,
  selection: BTreeSet<ItemId>,
  queue:     LoadQueue,
  history:   CommandLog,
}

impl Default for Scene {
  fn default() -> Self { Self::new(DEFAULT_UNDO_LIMIT) }
}

impl Scene {
  pub fn new(undo_limit: usize) -> Self {
    Self {
      items:     ItemSet::default(),
      selection: BTreeSet::new(),
      queue:     LoadQueue::default(),
      history:   CommandLog::new(undo_limit),
    }
  }

  /// Remove all items and forget the undo history.
  pub fn clear(&mut self) {
    self.items.clear();
    self.selection.clear();
    self.queue.clear();
    self.history.clear();
  }

  // ── Items ─────────────────────────────────────────────────────────────

  pub fn items(&self) -> &ItemSet { &self.items }

  pub fn len(&self) -> usize { self.items.len() }

  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  pub fn get(&self, id: ItemId) -> Option<&Item> { self.items.get(id) }

  /// Direct access for state outside the document history, e.g. which GIF
  /// frame is on display.
  pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
    self.items.get_mut(id)
  }

  /// Live items that get written to an archive, in insertion order.
  pub fn items_for_save(&self) -> Vec<&Item> {
    self.items.iter().filter(|item| item.is_persistable()).collect()
  }

  pub fn items_by_type(&self, kind: ItemKind) -> Vec<&Item> {
    self.items.iter().filter(|item| item.kind() == kind).collect()
  }

  /// Items from bottom to top.
  pub fn items_in_z_order(&self) -> Vec<&Item> {
    let mut items: Vec<_> = self.items.iter().collect();
    items.sort_by(|a, b| a.transform.z.total_cmp(&b.transform.z));
    items
  }

  pub fn max_z(&self) -> f64 {
    self.items.iter().map(|item| item.transform.z).fold(0.0, f64::max)
  }

  pub fn min_z(&self) -> f64 {
    self.items.iter().map(|item| item.transform.z).fold(0.0, f64::min)
  }

  /// Save ids of rows represented by error placeholders.
  pub fn protected_save_ids(&self) -> BTreeSet<i64> {
    self.items.iter().filter_map(Item::original_save_id).collect()
  }

  pub fn snapshot_for_save(&self) -> SaveSnapshot {
    SaveSnapshot {
      items:     self.items_for_save().into_iter().cloned().collect(),
      protected: self.protected_save_ids(),
    }
  }

  /// Forget all save ids so the next save writes every item as new.
  /// Placeholders stop protecting their rows as well. Items held by the
  /// undo history are included, so undoing after a save-as never points at
  /// rows of the previous file.
  pub fn clear_save_ids(&mut self) {
    for item in self.items.iter_mut() {
      release_rows(item, |_| true);
    }
    self.history.for_each_stashed_item(|item| release_rows(item, |_| true));
  }

  /// Drop references to rows an archive deleted. SQLite may hand their ids
  /// to later inserts, so an item restored by undo must be written as new.
  pub fn forget_save_ids(&mut self, deleted: &[i64]) {
    if deleted.is_empty() {
      return;
    }
    let deleted: BTreeSet<i64> = deleted.iter().copied().collect();
    let released = |id: i64| deleted.contains(&id);
    for item in self.items.iter_mut() {
      release_rows(item, released);
    }
    self.history.for_each_stashed_item(|item| release_rows(item, released));
  }

  /// Record the ids an archive assigned during a save.
  pub fn apply_save_ids(&mut self, assigned: &[(ItemId, i64)]) {
    let mut stashed = Vec::new();
    for &(id, save_id) in assigned {
      if let Some(item) = self.items.get_mut(id) {
        item.save_id = Some(save_id);
      } else {
        stashed.push((id, save_id));
      }
    }
    if stashed.is_empty() {
      return;
    }
    // Removed while the save ran; the row still belongs to it.
    self.history.for_each_stashed_item(|item| {
      if let Some(&(_, save_id)) = stashed.iter().find(|(id, _)| *id == item.id()) {
        item.save_id = Some(save_id);
      }
    });
    debug!(count = stashed.len(), "saved items are no longer in the scene");
  }

  // ── Deferred loading ──────────────────────────────────────────────────

  /// Queue a decoded item without touching the live set.
  pub fn add_item_later(&self, item: Item) { self.queue.push(item); }

  /// A handle to the deferred queue for a background load.
  pub fn load_queue(&self) -> LoadQueue { self.queue.clone() }

  /// Move everything queued into the live set. Returns the ids added.
  pub fn add_queued_items(&mut self) -> Vec<ItemId> {
    let queued = self.queue.drain();
    let ids: Vec<_> = queued.iter().map(Item::id).collect();
    for item in queued {
      self.items.insert(item);
    }
    if !ids.is_empty() {
      debug!(count = ids.len(), "added queued items");
    }
    ids
  }

  // ── Selection ─────────────────────────────────────────────────────────

  pub fn set_selected(&mut self, id: ItemId, selected: bool) {
    if selected && self.items.contains(id) {
      self.selection.insert(id);
    } else {
      self.selection.remove(&id);
    }
  }

  pub fn select_all(&mut self) {
    self.selection = self.items.iter().map(Item::id).collect();
  }

  pub fn deselect_all(&mut self) { self.selection.clear(); }

  pub fn is_selected(&self, id: ItemId) -> bool { self.selection.contains(&id) }

  pub fn selected_ids(&self) -> Vec<ItemId> {
    self.selection.iter().copied().collect()
  }

  pub fn selected_items(&self) -> Vec<&Item> {
    self.items.iter().filter(|item| self.selection.contains(&item.id())).collect()
  }

  pub fn has_selection(&self) -> bool { !self.selection.is_empty() }

  pub fn has_single_selection(&self) -> bool { self.selection.len() == 1 }

  // ── History ───────────────────────────────────────────────────────────

  pub fn history(&self) -> &CommandLog { &self.history }

  /// Apply `command` and record it for undo.
  pub fn push(&mut self, command: Command) {
    self.history.push(command, &mut self.items);
    self.prune_selection();
  }

  pub fn undo(&mut self) {
    self.history.undo(&mut self.items);
    self.prune_selection();
  }

  pub fn redo(&mut self) {
    self.history.redo(&mut self.items);
    self.prune_selection();
  }

  pub fn is_clean(&self) -> bool { self.history.is_clean() }

  pub fn mark_clean(&mut self) { self.history.mark_clean(); }

  fn prune_selection(&mut self) {
    let items = &self.items;
    self.selection.retain(|id| items.contains(*id));
  }
}

/// Clear the row references of `item` that `released` matches.
fn release_rows(item: &mut Item, released: impl Fn(i64) -> bool) {
  if item.save_id.is_some_and(&released) {
    item.save_id = None;
  }
  if let ItemData::Error(err) = &mut item.data
    && err.original_save_id.is_some_and(&released)
  {
    err.original_save_id = None;
  }
}
