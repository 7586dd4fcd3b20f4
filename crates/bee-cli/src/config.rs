//! Settings for the `bee` binary.

use std::path::Path;

use anyhow::Context as _;
use bee_core::scene::DEFAULT_UNDO_LIMIT;
use bee_store_sqlite::ArchiveOptions;
use serde::Deserialize;

/// Settings layered from an optional config file and `BEE_*` environment
/// variables, the latter taking precedence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
  /// Steps kept in the undo history of a loaded board.
  pub undo_limit:     usize,
  /// How many times a save is tried before giving up.
  pub write_attempts: u32,
}

impl Default for BoardConfig {
  fn default() -> Self {
    Self {
      undo_limit:     DEFAULT_UNDO_LIMIT,
      write_attempts: ArchiveOptions::default().write_attempts,
    }
  }
}

impl BoardConfig {
  /// Read the configuration. A file named explicitly must exist.
  pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
    let mut builder = config::Config::builder();
    if let Some(path) = file {
      builder = builder.add_source(config::File::from(path));
    }
    builder
      .add_source(config::Environment::with_prefix("BEE").try_parsing(true))
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("invalid configuration")
  }

  pub fn archive_options(&self) -> ArchiveOptions {
    ArchiveOptions { write_attempts: self.write_attempts, ..ArchiveOptions::default() }
  }
}
