//! SQL schema of the bee archive format.
//!
//! New archives get [`SCHEMA`] in one go. Older files are brought up to date
//! by running every [`MIGRATIONS`] entry newer than their `user_version`.
//! Blobs live in an [sqlar](https://www.sqlite.org/sqlar.html) table so the
//! images can be pulled out with `sqlite3 -A`.

use std::time::Duration;

/// `PRAGMA application_id` of bee archives.
pub const APPLICATION_ID: i32 = 2_060_242_126;

/// `PRAGMA user_version` written by this version of the format.
pub const USER_VERSION: u32 = 4;

/// Mode bits recorded for each stored image.
pub const SQLAR_MODE: u32 = 0o644;

/// Tables of the current format.
pub const SCHEMA: &str = "
CREATE TABLE items (
    id       INTEGER PRIMARY KEY,
    type     TEXT NOT NULL,    -- item variant discriminant
    x        REAL DEFAULT 0,
    y        REAL DEFAULT 0,
    z        REAL DEFAULT 0,
    scale    REAL DEFAULT 1,
    rotation REAL DEFAULT 0,
    flip     INTEGER DEFAULT 1,
    data     JSON              -- type-specific payload
);

CREATE TABLE sqlar (
    name    TEXT PRIMARY KEY,
    item_id INTEGER NOT NULL UNIQUE,
    mode    INT,
    mtime   INT DEFAULT current_timestamp,
    sz      INT,
    data    BLOB,
    FOREIGN KEY (item_id) REFERENCES items (id) ON DELETE CASCADE
);
";

/// Steps that take a file from `version - 1` to `version`, in order.
pub const MIGRATIONS: &[(u32, &[&str])] = &[
  (1, &[
    "CREATE TABLE IF NOT EXISTS items (
        id       INTEGER PRIMARY KEY,
        type     TEXT NOT NULL,
        x        REAL DEFAULT 0,
        y        REAL DEFAULT 0,
        z        REAL DEFAULT 0,
        scale    REAL DEFAULT 1,
        rotation REAL DEFAULT 0,
        filename TEXT
    )",
    "CREATE TABLE IF NOT EXISTS sqlar (
        name    TEXT PRIMARY KEY,
        item_id INTEGER NOT NULL UNIQUE,
        mode    INT,
        mtime   INT DEFAULT current_timestamp,
        sz      INT,
        data    BLOB,
        FOREIGN KEY (item_id) REFERENCES items (id) ON DELETE CASCADE
    )",
  ]),
  (2, &["ALTER TABLE items ADD COLUMN flip INTEGER DEFAULT 1"]),
  (3, &[
    "ALTER TABLE items ADD COLUMN data JSON",
    "UPDATE items SET data = json_object('filename', filename)",
  ]),
  (4, &["ALTER TABLE items DROP COLUMN filename"]),
];

/// Identification of the archive format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFormat {
  pub application_id: i32,
  /// File extension without the leading dot.
  pub extension:      String,
}

impl Default for ArchiveFormat {
  fn default() -> Self {
    Self { application_id: APPLICATION_ID, extension: "bee".to_owned() }
  }
}

impl ArchiveFormat {
  pub fn user_version(&self) -> u32 { USER_VERSION }
}

/// Settings for one [`ArchiveIo`](crate::ArchiveIo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOptions {
  pub format:         ArchiveFormat,
  /// How many times a write is tried before its error is reported.
  pub write_attempts: u32,
  /// How long one statement waits for another connection's lock.
  pub busy_timeout:   Duration,
}

impl Default for ArchiveOptions {
  fn default() -> Self {
    Self {
      format:         ArchiveFormat::default(),
      write_attempts: 2,
      busy_timeout:   Duration::from_secs(5),
    }
  }
}
