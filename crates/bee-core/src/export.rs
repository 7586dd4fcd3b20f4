//! Writing the images of a board out as individual files.

use std::{
  fs,
  path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
  Error, Result,
  item::{Item, sort_by_filename},
  worker::{ProgressSink, UserDecision},
};

/// What an export did. `errors` lists files that could not be written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
  pub written:  Vec<PathBuf>,
  pub skipped:  Vec<PathBuf>,
  pub errors:   Vec<String>,
  pub canceled: bool,
}

/// Handling of files that already exist in the target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Existing {
  Ask,
  SkipAll,
  OverwriteAll,
}

/// Exports every image and GIF item's stored bytes into a directory.
///
/// Files are named with [`Item::get_filename_for_export`]; unsaved items are
/// numbered by their position in export order.
#[derive(Debug, Clone)]
pub struct ImagesExporter {
  dir:   PathBuf,
  items: Vec<Item>,
}

impl ImagesExporter {
  pub fn new<'a>(
    dir: impl Into<PathBuf>,
    items: impl IntoIterator<Item = &'a Item>,
  ) -> Self {
    let items = sort_by_filename(items.into_iter().filter(|item| item.is_image()))
      .into_iter()
      .cloned()
      .collect();
    Self { dir: dir.into(), items }
  }

  pub fn dir(&self) -> &Path { &self.dir }

  pub fn len(&self) -> usize { self.items.len() }

  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  /// Target paths in export order.
  pub fn targets(&self) -> Result<Vec<PathBuf>> {
    self
      .items
      .iter()
      .enumerate()
      .map(|(index, item)| self.target_for(index, item))
      .collect()
  }

  fn target_for(&self, index: usize, item: &Item) -> Result<PathBuf> {
    let format = item.image_format().ok_or(Error::NotAnImage(item.type_tag()))?;
    let default_id = i64::try_from(index + 1).unwrap_or(i64::MAX);
    let name = item.get_filename_for_export(format, Some(default_id))?;
    Ok(self.dir.join(name))
  }

  /// Write the files. Only a missing target directory fails the export as a
  /// whole; per-file failures are collected in the summary and reported to
  /// `sink`.
  pub fn export(&self, sink: &dyn ProgressSink) -> Result<ExportSummary> {
    if !fs::metadata(&self.dir)?.is_dir() {
      return Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotADirectory,
        format!("{} is not a directory", self.dir.display()),
      )));
    }

    let mut summary = ExportSummary::default();
    let mut existing = Existing::Ask;
    sink.begin(self.items.len());

    for (index, item) in self.items.iter().enumerate() {
      if sink.is_canceled() {
        summary.canceled = true;
        break;
      }

      let path = self.target_for(index, item)?;
      if path.exists() {
        let overwrite = match existing {
          Existing::SkipAll => false,
          Existing::OverwriteAll => true,
          Existing::Ask => match sink.ask(&path.to_string_lossy()) {
            UserDecision::Skip => false,
            UserDecision::Overwrite => true,
            UserDecision::SkipAll => {
              existing = Existing::SkipAll;
              false
            }
            UserDecision::OverwriteAll => {
              existing = Existing::OverwriteAll;
              true
            }
            UserDecision::Cancel => {
              summary.canceled = true;
              break;
            }
          },
        };
        if !overwrite {
          debug!(path = %path.display(), "skipping existing file");
          summary.skipped.push(path);
          sink.progress(index);
          continue;
        }
      }

      let bytes = item.binary_payload().unwrap_or_default();
      match fs::write(&path, bytes) {
        Ok(()) => {
          debug!(path = %path.display(), len = bytes.len(), "exported image");
          summary.written.push(path);
        }
        Err(err) => {
          let message = format!("{}: {err}", path.display());
          sink.report_error(message.clone());
          summary.errors.push(message);
        }
      }
      sink.progress(index);
    }

    info!(
      dir = %self.dir.display(),
      written = summary.written.len(),
      skipped = summary.skipped.len(),
      failed = summary.errors.len(),
      "export finished"
    );
    Ok(summary)
  }
}
