//! Board operations behind each subcommand.
//!
//! Loads, saves and exports run on the worker pool; this module follows
//! their events on the async side, answering questions and turning Ctrl-C
//! into cancellation.

use std::{
  io::{self, BufRead as _, Write as _},
  path::{Path, PathBuf},
};

use anyhow::{Context as _, anyhow, bail};
use bee_core::{
  command::Command,
  export::{ExportSummary, ImagesExporter},
  item::{Item, Transform},
  scene::Scene,
  worker::{self, Finished, UserDecision, WorkerEvent, WorkerHandle},
};
use bee_store_sqlite::{
  ArchiveInfo, ArchiveIo, ReadOutcome, WriteOutcome, apply_write, inspect,
  is_archive_file, tasks, with_archive_extension,
};
use clap::ValueEnum;
use tracing::{debug, info, warn};

use crate::config::BoardConfig;

/// Offset between consecutive items added in one go.
const CASCADE: f64 = 20.0;

// ─── Conflicts ───────────────────────────────────────────────────────────────

/// What to do when an export target already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OnConflict {
  /// Prompt on the terminal for each file.
  #[default]
  Ask,
  Skip,
  Overwrite,
}

impl OnConflict {
  async fn decide(self, context: String) -> UserDecision {
    match self {
      Self::Skip => UserDecision::SkipAll,
      Self::Overwrite => UserDecision::OverwriteAll,
      Self::Ask => tokio::task::spawn_blocking(move || prompt(&context))
        .await
        .unwrap_or_default(),
    }
  }
}

fn prompt(path: &str) -> UserDecision {
  print!(
    "{path} already exists. [s]kip, skip [a]ll, [o]verwrite, overwrite al[l], [c]ancel? "
  );
  io::stdout().flush().ok();
  let mut line = String::new();
  if io::stdin().lock().read_line(&mut line).is_err() {
    return UserDecision::Cancel;
  }
  parse_answer(&line)
}

pub(crate) fn parse_answer(line: &str) -> UserDecision {
  match line.trim() {
    "a" => UserDecision::SkipAll,
    "o" => UserDecision::Overwrite,
    "l" => UserDecision::OverwriteAll,
    "c" => UserDecision::Cancel,
    _ => UserDecision::Skip,
  }
}

// ─── Driving workers ─────────────────────────────────────────────────────────

/// Follow a background run to its end. Ctrl-C asks it to stop.
async fn drive<T>(
  mut handle: WorkerHandle<T>,
  on_conflict: OnConflict,
  mut on_progress: impl FnMut(usize),
) -> Finished<T> {
  let cancel = handle.cancellation_token();
  let mut total = 0;
  let mut finished = None;
  loop {
    tokio::select! {
      event = handle.next_event() => match event {
        Some(WorkerEvent::Begin { total: n }) => total = n,
        Some(WorkerEvent::Progress { index }) => {
          debug!(done = index + 1, total, "progress");
          on_progress(index);
        }
        Some(WorkerEvent::UserInputRequired { context, reply }) => {
          let _ = reply.send(on_conflict.decide(context).await);
        }
        Some(WorkerEvent::Finished(result)) => finished = Some(result),
        None => break,
      },
      _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
        warn!("interrupted; stopping after the current item");
        cancel.cancel();
      }
    }
  }
  finished.unwrap_or_else(|| Finished {
    output: None,
    errors: vec!["worker exited without reporting".to_owned()],
  })
}

fn into_result<T>(finished: Finished<T>) -> anyhow::Result<T> {
  finished.output.ok_or_else(|| anyhow!(finished.errors.join("\n")))
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// Create an empty board, replacing any file at the path. Returns the path
/// actually written, which always carries the archive extension.
pub async fn create(path: &Path, config: &BoardConfig) -> anyhow::Result<PathBuf> {
  let options = config.archive_options();
  let path = with_archive_extension(path, &options.format);
  let mut scene = Scene::new(config.undo_limit);
  save(&mut scene, ArchiveIo::open(&path, true, false, options)).await?;
  info!(path = %path.display(), "created board");
  Ok(path)
}

/// Load a board without modifying it beyond any pending migration.
pub async fn load(
  path: &Path,
  config: &BoardConfig,
) -> anyhow::Result<(Scene, ReadOutcome)> {
  let options = config.archive_options();
  if !path.exists() || !is_archive_file(path, &options.format) {
    bail!("{} is not a bee archive", path.display());
  }

  let mut scene = Scene::new(config.undo_limit);
  let handle = tasks::spawn_load(ArchiveIo::open(path, false, true, options), &scene);
  let finished = drive(handle, OnConflict::Skip, |_| {
    scene.add_queued_items();
  })
  .await;
  let outcome = into_result(finished)?;
  scene.add_queued_items();

  if outcome.is_canceled() {
    bail!("loading {} was canceled", path.display());
  }
  for problem in &outcome.problems {
    warn!(%problem, "item could not be loaded");
  }
  Ok((scene, outcome))
}

async fn save(scene: &mut Scene, io: ArchiveIo) -> anyhow::Result<WriteOutcome> {
  let finished = drive(tasks::spawn_save(io, scene), OnConflict::Skip, |_| {}).await;
  let outcome = into_result(finished)?;
  apply_write(scene, &outcome);
  if outcome.canceled {
    warn!("save canceled; items after the interruption were not written");
  }
  Ok(outcome)
}

/// Add image files and text notes to a board and save it.
pub async fn add(
  path: &Path,
  images: &[PathBuf],
  texts: &[String],
  config: &BoardConfig,
) -> anyhow::Result<WriteOutcome> {
  let (mut scene, _) = load(path, config).await?;

  let mut items = Vec::with_capacity(images.len() + texts.len());
  for image in images {
    let bytes = tokio::fs::read(image)
      .await
      .with_context(|| format!("failed to read {}", image.display()))?;
    let filename = std::path::absolute(image).unwrap_or_else(|_| image.clone());
    let item = Item::image(bytes, Some(filename.display().to_string()))
      .with_context(|| format!("{} is not a supported image", image.display()))?;
    items.push(item);
  }
  items.extend(texts.iter().map(Item::text));
  if items.is_empty() {
    bail!("nothing to add");
  }

  let top = scene.max_z();
  for (index, item) in items.iter_mut().enumerate() {
    let offset = CASCADE * index as f64;
    item.transform = Transform::at(offset, offset).with_z(top + 1.0 + index as f64);
  }
  let added = items.len();
  scene.push(Command::insert_items(items));

  let outcome = save(&mut scene, ArchiveIo::open(path, false, false, config.archive_options())).await?;
  info!(added, path = %path.display(), "added items");
  Ok(outcome)
}

/// Write every image on the board into `dir`.
pub async fn export(
  path: &Path,
  dir: &Path,
  on_conflict: OnConflict,
  config: &BoardConfig,
) -> anyhow::Result<ExportSummary> {
  let (scene, _) = load(path, config).await?;
  let exporter = ImagesExporter::new(dir, scene.items().iter());
  if exporter.is_empty() {
    info!(path = %path.display(), "board has no images");
  }
  let handle = worker::spawn(move |sink| exporter.export(sink));
  into_result(drive(handle, on_conflict, |_| {}).await)
}

pub fn info(path: &Path) -> anyhow::Result<ArchiveInfo> {
  if !path.exists() {
    bail!("{} does not exist", path.display());
  }
  Ok(inspect(path)?)
}

/// Bring a board to the current format. Returns the resulting version.
pub fn migrate(path: &Path, config: &BoardConfig) -> anyhow::Result<u32> {
  if !path.exists() {
    bail!("{} does not exist", path.display());
  }
  let mut io = ArchiveIo::open(path, false, false, config.archive_options());
  Ok(io.migrate()?)
}
