//! `bee`: create, inspect and edit bee reference boards from the terminal.
//!
//! # Usage
//!
//! ```
//! bee new moodboard
//! bee add moodboard.bee cat.png dog.gif --text "colour palette"
//! bee list moodboard.bee
//! bee export moodboard.bee ./images --on-conflict overwrite
//! ```
//!
//! Settings come from `--config FILE` and `BEE_*` environment variables
//! (`BEE_UNDO_LIMIT`, `BEE_WRITE_ATTEMPTS`). Log verbosity follows
//! `RUST_LOG`.

mod board;
mod config;

use std::path::PathBuf;

use anyhow::Context as _;
use board::OnConflict;
use clap::{Parser, Subcommand};
use config::BoardConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "Bee reference board archives")]
struct Cli {
  /// Path to a configuration file (TOML, JSON or YAML).
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: BoardCommand,
}

#[derive(Subcommand, Debug)]
enum BoardCommand {
  /// Create an empty board, replacing any existing file.
  New { file: PathBuf },

  /// Show format version and content counts without modifying the file.
  Info { file: PathBuf },

  /// List the items on a board.
  List { file: PathBuf },

  /// Add images and text notes to a board.
  Add {
    file:   PathBuf,
    /// Image files (PNG, JPEG or GIF).
    images: Vec<PathBuf>,
    /// A text note; may be given more than once.
    #[arg(short, long = "text", value_name = "TEXT")]
    texts:  Vec<String>,
  },

  /// Write every image on a board into a directory.
  Export {
    file: PathBuf,
    dir:  PathBuf,
    #[arg(long, value_enum, default_value_t)]
    on_conflict: OnConflict,
  },

  /// Upgrade a board to the current archive format.
  Migrate { file: PathBuf },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let config = BoardConfig::load(cli.config.as_deref())?;
  tracing::debug!(?config, "loaded configuration");

  match cli.command {
    BoardCommand::New { file } => {
      let path = board::create(&file, &config).await?;
      println!("{}", path.display());
    }

    BoardCommand::Info { file } => {
      let info = board::info(&file)?;
      println!("application id: {}", info.application_id);
      println!("format version: {}", info.user_version);
      println!("image bytes:    {}", info.blob_bytes);
      for (type_tag, count) in &info.items_by_type {
        println!("{type_tag:<14}  {count}");
      }
    }

    BoardCommand::List { file } => {
      let (scene, _) = board::load(&file, &config)
        .await
        .with_context(|| format!("failed to load {}", file.display()))?;
      for item in scene.items().iter() {
        let t = item.transform;
        println!(
          "{:>5}  ({:.1}, {:.1})  z={}  scale={}  rotation={}  {}",
          item.save_id.or(item.original_save_id()).unwrap_or_default(),
          t.x,
          t.y,
          t.z,
          t.scale,
          t.rotation,
          item
        );
      }
    }

    BoardCommand::Add { file, images, texts } => {
      let outcome = board::add(&file, &images, &texts, &config).await?;
      println!("added {} item(s)", outcome.assigned.len());
    }

    BoardCommand::Export { file, dir, on_conflict } => {
      let summary = board::export(&file, &dir, on_conflict, &config).await?;
      println!(
        "{} written, {} skipped{}",
        summary.written.len(),
        summary.skipped.len(),
        if summary.canceled { ", canceled" } else { "" }
      );
      for message in &summary.errors {
        eprintln!("{message}");
      }
    }

    BoardCommand::Migrate { file } => {
      let version = board::migrate(&file, &config)?;
      println!("{} is at format version {version}", file.display());
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests;
