//! Error types for `bee-store-sqlite`.
//!
//! Inside the crate everything is a [`Fault`]. Faults never cross the public
//! API: [`ArchiveIo`](crate::ArchiveIo) turns them into an [`Error`] naming
//! the archive, after rolling back and closing its connection.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum Fault {
  #[error("{0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("{0}")]
  Io(#[from] std::io::Error),

  #[error("invalid item data: {0}")]
  Json(#[from] serde_json::Error),

  #[error("{0}")]
  Core(#[from] bee_core::Error),

  #[error("attempt to write to a read-only archive")]
  ReadOnly,

  #[error("file is not a {0} archive")]
  NotAnArchive(String),

  /// A schema step failed for a reason other than contention.
  #[error("migration to version {version} failed: {source}")]
  Migration { version: u32, source: rusqlite::Error },
}

impl Fault {
  /// Whether retrying the whole operation on a fresh connection may help.
  pub(crate) fn is_transient(&self) -> bool {
    matches!(self, Self::Sqlite(_) | Self::Io(_))
  }

  pub(crate) fn kind(&self) -> ErrorKind {
    match self {
      Self::Sqlite(_) | Self::NotAnArchive(_) | Self::Migration { .. } => {
        ErrorKind::Store
      }
      Self::Io(_) | Self::Core(bee_core::Error::Io(_)) => ErrorKind::Io,
      Self::Json(_) | Self::Core(_) => ErrorKind::Value,
      Self::ReadOnly => ErrorKind::ReadOnly,
    }
  }

  pub(crate) fn into_error(self, filename: &Path) -> Error {
    Error {
      filename: filename.to_owned(),
      kind:     self.kind(),
      message:  self.to_string(),
    }
  }
}

/// Broad category of an archive failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The database engine refused or the file isn't a usable archive.
  Store,
  Io,
  /// Item data couldn't be encoded or decoded.
  Value,
  /// A write was attempted on an archive opened read-only.
  ReadOnly,
}

/// A failed read or write of an archive.
#[derive(Debug, Clone, Error)]
#[error("problem with {}: {message}", filename.display())]
pub struct Error {
  pub filename: PathBuf,
  pub kind:     ErrorKind,
  pub message:  String,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
