//! Schema creation and upgrades, keyed on `PRAGMA user_version`.

use rusqlite::{Connection, ErrorCode};
use tracing::{debug, info};

use crate::{
  error::Fault,
  schema::{ArchiveFormat, MIGRATIONS, SCHEMA, USER_VERSION},
};

pub(crate) fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
  conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

pub(crate) fn application_id(conn: &Connection) -> rusqlite::Result<i32> {
  conn.pragma_query_value(None, "application_id", |row| row.get(0))
}

/// Stamp the file as a current-version archive.
pub(crate) fn write_meta(
  conn: &Connection,
  format: &ArchiveFormat,
) -> rusqlite::Result<()> {
  conn.pragma_update(None, "application_id", format.application_id)?;
  conn.pragma_update(None, "user_version", USER_VERSION)?;
  Ok(())
}

/// Create the current schema in an empty database.
pub(crate) fn create_schema(
  conn: &mut Connection,
  format: &ArchiveFormat,
) -> Result<(), Fault> {
  let tx = conn.transaction()?;
  tx.execute_batch(SCHEMA)?;
  write_meta(&tx, format)?;
  tx.commit()?;
  debug!(version = USER_VERSION, "created schema");
  Ok(())
}

/// Bring the file up to [`USER_VERSION`] in a single transaction.
///
/// Returns the versions whose steps were applied; empty when the file was
/// already current.
pub(crate) fn migrate(
  conn: &mut Connection,
  format: &ArchiveFormat,
) -> Result<Vec<u32>, Fault> {
  let version = schema_version(conn)?;
  debug!(version, "found archive version");
  if version >= USER_VERSION {
    return Ok(Vec::new());
  }

  let tx = conn.transaction()?;
  let mut applied = Vec::new();
  for &(target, steps) in MIGRATIONS {
    if target <= version || target > USER_VERSION {
      continue;
    }
    debug!(from = target - 1, to = target, "migrating");
    for step in steps {
      tx.execute_batch(step).map_err(|err| step_fault(target, err))?;
    }
    applied.push(target);
  }
  write_meta(&tx, format)?;
  tx.commit()?;

  info!(from = version, to = USER_VERSION, "migrated archive");
  Ok(applied)
}

/// Lock contention stays retryable; anything else means the file can't be
/// brought to `version`.
fn step_fault(version: u32, err: rusqlite::Error) -> Fault {
  match err.sqlite_error_code() {
    Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Fault::Sqlite(err),
    _ => Fault::Migration { version, source: err },
  }
}
