//! SQLite archive format for bee boards.
//!
//! An archive is a single SQLite file: one `items` row per item plus an
//! `sqlar` table holding image bytes. [`ArchiveIo`] reads archives into a
//! scene's load queue and writes scene snapshots back, migrating older files
//! on the way. [`tasks`] runs both on the worker thread pool.

mod archive;
mod encode;
mod migrate;
mod sniff;

pub mod error;
pub mod schema;
pub mod tasks;

pub use archive::{
  ArchiveInfo, ArchiveIo, ReadOutcome, WriteOutcome, apply_write, inspect,
};
pub use error::{Error, ErrorKind, Result};
pub use schema::{APPLICATION_ID, ArchiveFormat, ArchiveOptions, USER_VERSION};
pub use sniff::{SQLITE_HEADER, is_archive_file, with_archive_extension};
