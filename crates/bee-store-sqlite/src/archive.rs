//! [`ArchiveIo`]: reading a scene from and writing it to an archive file.

use std::{
  collections::{BTreeMap, BTreeSet},
  fs,
  path::{Path, PathBuf},
};

use bee_core::{
  item::{Item, ItemId},
  scene::{LoadQueue, SaveSnapshot, Scene},
  worker::{NoProgress, ProgressSink},
};
use rusqlite::{Connection, OpenFlags, Transaction, params};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::{
  Error, Result,
  encode::{ItemColumns, RawItemRow, SELECT_ITEMS},
  error::Fault,
  migrate,
  schema::{ArchiveFormat, ArchiveOptions, SQLAR_MODE, USER_VERSION},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOutcome {
  /// The archive read; `None` when the load was canceled.
  pub filename: Option<PathBuf>,
  /// Items pushed onto the load queue, placeholders included.
  pub loaded:   usize,
  /// One entry per row that was replaced by an error placeholder.
  pub problems: Vec<String>,
}

impl ReadOutcome {
  pub fn is_canceled(&self) -> bool { self.filename.is_none() }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
  pub filename: PathBuf,
  /// Rows created by this write, keyed by the item they belong to.
  pub assigned: Vec<(ItemId, i64)>,
  pub updated:  usize,
  pub deleted:  Vec<i64>,
  /// The scene's save ids referred to another file (or none), so every item
  /// was written as new.
  pub fresh:    bool,
  pub canceled: bool,
  /// Tries it took, counting the one that succeeded.
  pub attempts: u32,
}

/// Metadata of an archive, read without migrating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
  pub application_id: i32,
  pub user_version:   u32,
  pub items_by_type:  BTreeMap<String, usize>,
  pub blob_bytes:     i64,
}

// ─── ArchiveIo ───────────────────────────────────────────────────────────────

/// One open archive.
///
/// The connection is established on first use and owned exclusively until
/// [`ArchiveIo::close`] or drop. Failures are reported as [`Error`] after the
/// connection has been rolled back and closed; the next call reconnects.
#[derive(Debug)]
pub struct ArchiveIo {
  path:       PathBuf,
  create_new: bool,
  readonly:   bool,
  options:    ArchiveOptions,
  conn:       Option<Connection>,
  /// Holds the migrated copy of a read-only archive that couldn't be
  /// migrated in place.
  tmpdir:     Option<TempDir>,
  /// Rows in the archive are unrelated to the save ids of the scene.
  fresh:      bool,
}

impl ArchiveIo {
  /// Prepare to access the archive at `path`. Nothing touches the disk until
  /// the first read or write.
  ///
  /// With `create_new`, an existing file at `path` is replaced by an empty
  /// archive. `readonly` forbids writes; it takes precedence over
  /// `create_new`.
  pub fn open(
    path: impl Into<PathBuf>,
    create_new: bool,
    readonly: bool,
    options: ArchiveOptions,
  ) -> Self {
    Self {
      path: path.into(),
      create_new: create_new && !readonly,
      readonly,
      options,
      conn: None,
      tmpdir: None,
      fresh: false,
    }
  }

  pub fn path(&self) -> &Path { &self.path }

  pub fn is_readonly(&self) -> bool { self.readonly }

  pub fn options(&self) -> &ArchiveOptions { &self.options }

  fn format(&self) -> &ArchiveFormat { &self.options.format }

  /// The migrated temporary copy in use instead of [`ArchiveIo::path`], if
  /// any.
  pub fn working_copy(&self) -> Option<PathBuf> {
    self.tmpdir.as_ref().map(|dir| dir.path().join(TEMP_COPY_NAME))
  }

  // ── Connection ────────────────────────────────────────────────────────

  fn connection(&mut self) -> Result<&mut Connection, Fault> {
    let conn = match self.conn.take() {
      Some(conn) => conn,
      None => self.establish()?,
    };
    Ok(self.conn.insert(conn))
  }

  fn establish(&mut self) -> Result<Connection, Fault> {
    if self.create_new {
      return self.create();
    }

    let conn = open_connection(&self.path, self.readonly, &self.options)?;
    match self.upgrade(conn) {
      Ok(conn) => Ok(conn),
      // Only a failed schema step gives up on the file. Busy files, foreign
      // databases and I/O errors are reported with the file left in place.
      Err(fault @ Fault::Migration { .. }) if !self.readonly => {
        let backup = backup_path(&self.path);
        error!(
          path = %self.path.display(),
          backup = %backup.display(),
          %fault,
          "could not migrate archive; moving it aside and starting a new one"
        );
        fs::rename(&self.path, &backup)?;
        self.create()
      }
      Err(fault) => Err(fault),
    }
  }

  /// Replace whatever is at the path with an empty current-version archive.
  fn create(&mut self) -> Result<Connection, Fault> {
    if self.path.exists() {
      debug!(path = %self.path.display(), "removing existing file");
      fs::remove_file(&self.path)?;
    }
    let mut conn = open_connection(&self.path, false, &self.options)?;
    migrate::create_schema(&mut conn, &self.options.format)?;
    info!(path = %self.path.display(), "created archive");
    self.create_new = false;
    self.fresh = true;
    Ok(conn)
  }

  fn upgrade(&mut self, mut conn: Connection) -> Result<Connection, Fault> {
    let version = migrate::schema_version(&conn)?;
    check_identity(&conn, version, self.format())?;
    if version >= USER_VERSION {
      return Ok(conn);
    }

    if self.readonly {
      // A read-only open still migrates in place when the file allows it.
      // Permission bits are checked first: SQLite ignores them for root.
      let writable = !fs::metadata(&self.path)?.permissions().readonly()
        && conn
          .pragma_update(None, "application_id", self.format().application_id)
          .is_ok();
      if !writable {
        debug!("archive is not writable; migrating a temporary copy");
        drop(conn);
        let dir = tempfile::Builder::new().prefix("bee").tempdir()?;
        let copy = dir.path().join(TEMP_COPY_NAME);
        fs::copy(&self.path, &copy)?;
        conn = open_connection(&copy, false, &self.options)?;
        self.tmpdir = Some(dir);
      }
    }

    migrate::migrate(&mut conn, &self.options.format)?;
    Ok(conn)
  }

  /// Close the connection and discard any temporary copy.
  pub fn close(&mut self) {
    self.close_connection();
    self.tmpdir = None;
  }

  fn close_connection(&mut self) {
    if let Some(conn) = self.conn.take() {
      if let Err((_, err)) = conn.close() {
        warn!(path = %self.path.display(), %err, "error closing archive");
      }
    }
  }

  /// Clean up after a failed operation and describe the failure.
  fn fail(&mut self, fault: Fault) -> Error {
    error!(path = %self.path.display(), %fault, "error while accessing archive");
    if let Some(conn) = &self.conn {
      if !conn.is_autocommit() && conn.execute_batch("ROLLBACK").is_ok() {
        debug!("transaction rolled back");
      }
    }
    self.close();
    fault.into_error(&self.path)
  }

  // ── Migration ─────────────────────────────────────────────────────────

  /// Connect, migrating if necessary, and report the schema version now in
  /// use.
  pub fn migrate(&mut self) -> Result<u32> {
    let attempt = self
      .connection()
      .and_then(|conn| Ok(migrate::schema_version(conn)?));
    attempt.map_err(|fault| self.fail(fault))
  }

  // ── Read ──────────────────────────────────────────────────────────────

  /// Decode every row and push the items onto `queue`.
  ///
  /// Rows that can't be decoded are pushed as error placeholders and listed
  /// in [`ReadOutcome::problems`]. Cancellation is checked after each row;
  /// a canceled read reports no filename and no problems.
  pub fn read(
    &mut self,
    queue: &LoadQueue,
    sink: &dyn ProgressSink,
  ) -> Result<ReadOutcome> {
    self.try_read(queue, sink).map_err(|fault| self.fail(fault))
  }

  /// [`ArchiveIo::read`] into the scene's load queue, without progress.
  pub fn read_into(&mut self, scene: &Scene) -> Result<ReadOutcome> {
    self.read(&scene.load_queue(), &NoProgress)
  }

  fn try_read(
    &mut self,
    queue: &LoadQueue,
    sink: &dyn ProgressSink,
  ) -> Result<ReadOutcome, Fault> {
    let filename = self.path.clone();
    let rows = {
      let conn = self.connection()?;
      let mut stmt = conn.prepare(SELECT_ITEMS)?;
      stmt
        .query_map([], RawItemRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?
    };

    sink.begin(rows.len());
    let mut outcome = ReadOutcome { filename: Some(filename), ..Default::default() };
    for (index, row) in rows.into_iter().enumerate() {
      let save_id = row.id;
      let (item, problem) = row.into_item();
      debug!(index, save_id, item = %item, "read item");
      queue.push(item);
      outcome.loaded += 1;
      outcome.problems.extend(problem);

      sink.progress(index);
      if sink.is_canceled() {
        info!(loaded = outcome.loaded, "load canceled");
        return Ok(ReadOutcome { filename: None, loaded: outcome.loaded, problems: Vec::new() });
      }
    }

    info!(
      path = %self.path.display(),
      loaded = outcome.loaded,
      problems = outcome.problems.len(),
      "read archive"
    );
    Ok(outcome)
  }

  // ── Write ─────────────────────────────────────────────────────────────

  /// Write `snapshot`, deleting rows of items no longer in it.
  ///
  /// Rows listed in [`SaveSnapshot::protected`] are never deleted. Store and
  /// I/O failures are retried on a fresh connection up to
  /// [`ArchiveOptions::write_attempts`] times in total. Save ids are only
  /// reported once the transaction has committed; apply them with
  /// [`Scene::apply_save_ids`].
  pub fn write(
    &mut self,
    snapshot: &SaveSnapshot,
    sink: &dyn ProgressSink,
  ) -> Result<WriteOutcome> {
    if self.readonly {
      return Err(self.fail(Fault::ReadOnly));
    }

    let attempts = self.options.write_attempts.max(1);
    let mut attempt = 1;
    loop {
      match self.try_write(snapshot, sink) {
        Ok(outcome) => return Ok(WriteOutcome { attempts: attempt, ..outcome }),
        Err(fault) if fault.is_transient() && attempt < attempts => {
          warn!(attempt, %fault, "write failed; retrying on a new connection");
          self.close_connection();
          attempt += 1;
        }
        Err(fault) => return Err(self.fail(fault)),
      }
    }
  }

  /// Write the scene and record the new save ids on its items. A completed
  /// write marks the scene clean.
  pub fn write_scene(&mut self, scene: &mut Scene) -> Result<WriteOutcome> {
    let outcome = self.write(&scene.snapshot_for_save(), &NoProgress)?;
    apply_write(scene, &outcome);
    Ok(outcome)
  }

  fn try_write(
    &mut self,
    snapshot: &SaveSnapshot,
    sink: &dyn ProgressSink,
  ) -> Result<WriteOutcome, Fault> {
    self.connection()?;
    let fresh = self.fresh;
    let filename = self.path.clone();
    let conn = self.connection()?;

    let tx = conn.transaction()?;
    let staged = write_items(&tx, snapshot, fresh, sink)?;
    tx.commit()?;
    if let Err(err) = conn.execute_batch("VACUUM") {
      warn!(%err, "could not compact archive");
    }
    self.fresh = false;

    info!(
      path = %filename.display(),
      inserted = staged.assigned.len(),
      updated = staged.updated,
      deleted = staged.deleted.len(),
      canceled = staged.canceled,
      "wrote archive"
    );
    Ok(WriteOutcome { filename, fresh, ..staged })
  }
}

impl Drop for ArchiveIo {
  fn drop(&mut self) { self.close(); }
}

/// Bring the scene in line with a completed write.
pub fn apply_write(scene: &mut Scene, outcome: &WriteOutcome) {
  if outcome.fresh {
    scene.clear_save_ids();
  }
  scene.forget_save_ids(&outcome.deleted);
  scene.apply_save_ids(&outcome.assigned);
  if !outcome.canceled {
    scene.mark_clean();
  }
}

/// Read the metadata of the archive at `path` without changing it.
pub fn inspect(path: &Path) -> Result<ArchiveInfo> {
  let info = || -> Result<ArchiveInfo, Fault> {
    let conn = Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let mut items_by_type = BTreeMap::new();
    let mut stmt = conn.prepare("SELECT type, count(*) FROM items GROUP BY type")?;
    let rows = stmt.query_map([], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
      let (type_tag, count) = row?;
      items_by_type.insert(type_tag, usize::try_from(count).unwrap_or(0));
    }
    Ok(ArchiveInfo {
      application_id: migrate::application_id(&conn)?,
      user_version: migrate::schema_version(&conn)?,
      items_by_type,
      blob_bytes: conn.query_row(
        "SELECT coalesce(sum(sz), 0) FROM sqlar",
        [],
        |row| row.get(0),
      )?,
    })
  };
  info().map_err(|fault| fault.into_error(path))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

const TEMP_COPY_NAME: &str = "mig.bee";

fn open_connection(
  path: &Path,
  readonly: bool,
  options: &ArchiveOptions,
) -> rusqlite::Result<Connection> {
  // Read-only opens must not create the file.
  let flags = if readonly {
    OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX
  } else {
    OpenFlags::default()
  };
  let conn = Connection::open_with_flags(path, flags)?;
  conn.execute_batch("PRAGMA foreign_keys = ON;")?;
  conn.busy_timeout(options.busy_timeout)?;
  Ok(conn)
}

/// Refuse SQLite files that belong to another application.
fn check_identity(
  conn: &Connection,
  version: u32,
  format: &ArchiveFormat,
) -> Result<(), Fault> {
  let application_id = migrate::application_id(conn)?;
  if application_id != 0 && application_id != format.application_id {
    return Err(Fault::NotAnArchive(format.extension.clone()));
  }
  if version == 0 {
    let tables: i64 = conn.query_row(
      "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
      [],
      |row| row.get(0),
    )?;
    if tables > 0 {
      return Err(Fault::NotAnArchive(format.extension.clone()));
    }
  }
  Ok(())
}

/// `<path>.bak`
fn backup_path(path: &Path) -> PathBuf {
  let mut name = path.as_os_str().to_owned();
  name.push(".bak");
  PathBuf::from(name)
}

fn write_items(
  tx: &Transaction<'_>,
  snapshot: &SaveSnapshot,
  fresh: bool,
  sink: &dyn ProgressSink,
) -> Result<WriteOutcome, Fault> {
  let existing: BTreeSet<i64> = {
    let mut stmt = tx.prepare("SELECT id FROM items")?;
    stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?
  };

  let save_id = |item: &Item| if fresh { None } else { item.save_id };
  // Rows that survive this write. A row is updated for at most one item;
  // any other item naming it is written as new.
  let mut claimed: BTreeSet<i64> = BTreeSet::new();
  if !fresh {
    debug!(protected = ?snapshot.protected, "keeping rows of items that failed to load");
    claimed.extend(&snapshot.protected);
  }

  let mut outcome = WriteOutcome::default();
  sink.begin(snapshot.items.len());
  for (index, item) in snapshot.items.iter().enumerate() {
    let columns = ItemColumns::from_item(item)?;
    let target =
      save_id(item).filter(|id| existing.contains(id) && !claimed.contains(id));
    let updated = match target {
      Some(id) => update_item(tx, id, &columns)?.then_some(id),
      None => None,
    };
    match updated {
      Some(id) => {
        debug!(save_id = id, item = %item, "updated item");
        claimed.insert(id);
        outcome.updated += 1;
      }
      None => {
        if let Some(stale) = save_id(item) {
          debug!(save_id = stale, item = %item, "save id does not match a free row");
        }
        let id = insert_item(tx, item, &columns)?;
        debug!(save_id = id, item = %item, "inserted item");
        claimed.insert(id);
        outcome.assigned.push((item.id(), id));
      }
    }

    sink.progress(index);
    if sink.is_canceled() {
      info!(saved = index + 1, "save canceled");
      outcome.canceled = true;
      // Unwritten items keep their rows for the next save.
      claimed.extend(snapshot.items[index + 1..].iter().filter_map(save_id));
      break;
    }
  }

  let to_delete: Vec<i64> = existing.difference(&claimed).copied().collect();
  delete_items(tx, &to_delete)?;
  outcome.deleted = to_delete;
  Ok(outcome)
}

/// Geometry and payload only; stored image bytes never change. Returns
/// false when no row with that id holds an item of the same type.
fn update_item(
  tx: &Transaction<'_>,
  id: i64,
  columns: &ItemColumns,
) -> Result<bool, Fault> {
  let changed = tx.execute(
    "UPDATE items
     SET x = ?1, y = ?2, z = ?3, scale = ?4, rotation = ?5, flip = ?6, data = ?7
     WHERE id = ?8 AND type = ?9",
    params![
      columns.x,
      columns.y,
      columns.z,
      columns.scale,
      columns.rotation,
      columns.flip,
      columns.data,
      id,
      columns.type_tag,
    ],
  )?;
  Ok(changed > 0)
}

fn insert_item(
  tx: &Transaction<'_>,
  item: &Item,
  columns: &ItemColumns,
) -> Result<i64, Fault> {
  tx.execute(
    "INSERT INTO items (type, x, y, z, scale, rotation, flip, data)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    params![
      columns.type_tag,
      columns.x,
      columns.y,
      columns.z,
      columns.scale,
      columns.rotation,
      columns.flip,
      columns.data,
    ],
  )?;
  let id = tx.last_insert_rowid();

  if let (Some(bytes), Some(format)) = (item.binary_payload(), item.image_format()) {
    // Name the blob after the new row, not whatever id the item had before.
    let mut named = item.clone();
    named.save_id = Some(id);
    let name = named.get_filename_for_export(format, None)?;
    tx.execute(
      "INSERT INTO sqlar (item_id, name, mode, sz, data)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      params![id, name, SQLAR_MODE, bytes.len(), bytes],
    )?;
  }
  Ok(id)
}

fn delete_items(tx: &Transaction<'_>, ids: &[i64]) -> Result<(), Fault> {
  if ids.is_empty() {
    return Ok(());
  }
  debug!(?ids, "deleting items");
  let mut blobs = tx.prepare("DELETE FROM sqlar WHERE item_id = ?1")?;
  let mut items = tx.prepare("DELETE FROM items WHERE id = ?1")?;
  for id in ids {
    blobs.execute([id])?;
    items.execute([id])?;
  }
  Ok(())
}
