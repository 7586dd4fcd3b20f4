//! Recognising archive files on disk.

use std::{
  ffi::OsString,
  fs::File,
  io::Read as _,
  path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::schema::ArchiveFormat;

/// First 16 bytes of every SQLite database file.
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// A path names an archive when it carries the archive extension and, if the
/// file exists, starts with the SQLite header. An existing file that can't
/// be read is given the benefit of the doubt.
pub fn is_archive_file(path: &Path, format: &ArchiveFormat) -> bool {
  if path.extension().is_none_or(|ext| ext != format.extension.as_str()) {
    return false;
  }
  if !path.exists() {
    return true;
  }

  let mut header = [0u8; 16];
  let read = File::open(path).and_then(|mut file| file.read_exact(&mut header));
  match read {
    Ok(()) if &header == SQLITE_HEADER => true,
    Ok(()) => {
      warn!(path = %path.display(), "file has the archive extension but is not an SQLite database");
      false
    }
    Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
      warn!(path = %path.display(), "file is too short to be an archive");
      false
    }
    Err(err) => {
      debug!(path = %path.display(), %err, "could not read file header");
      true
    }
  }
}

/// `path` with the archive extension appended, unless it already has it.
pub fn with_archive_extension(path: &Path, format: &ArchiveFormat) -> PathBuf {
  if path.extension().is_some_and(|ext| ext == format.extension.as_str()) {
    return path.to_owned();
  }
  let mut name = OsString::from(path.as_os_str());
  name.push(".");
  name.push(&format.extension);
  PathBuf::from(name)
}
