//! End-to-end tests of the board operations.

use std::{io::Cursor, path::Path};

use bee_core::{item::ItemKind, worker::UserDecision};
use clap::Parser as _;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::{
  BoardCommand, Cli,
  board::{self, OnConflict},
  config::BoardConfig,
};

fn write_png(path: &Path) {
  let image = RgbaImage::from_pixel(4, 4, Rgba([0, 128, 255, 255]));
  let mut buf = Cursor::new(Vec::new());
  DynamicImage::ImageRgba8(image)
    .write_to(&mut buf, ImageFormat::Png)
    .unwrap();
  std::fs::write(path, buf.into_inner()).unwrap();
}

// ─── Arguments and configuration ─────────────────────────────────────────────

#[test]
fn parses_add_with_images_and_texts() {
  let cli = Cli::try_parse_from([
    "bee", "add", "board.bee", "a.png", "b.gif", "--text", "one", "-t", "two",
  ])
  .unwrap();
  match cli.command {
    BoardCommand::Add { file, images, texts } => {
      assert_eq!(file, Path::new("board.bee"));
      assert_eq!(images.len(), 2);
      assert_eq!(texts, ["one", "two"]);
    }
    other => panic!("parsed {other:?}"),
  }
}

#[test]
fn export_conflicts_default_to_asking() {
  let cli = Cli::try_parse_from(["bee", "export", "board.bee", "out"]).unwrap();
  assert!(matches!(
    cli.command,
    BoardCommand::Export { on_conflict: OnConflict::Ask, .. }
  ));
}

#[test]
fn prompt_answers() {
  assert_eq!(board::parse_answer("a\n"), UserDecision::SkipAll);
  assert_eq!(board::parse_answer(" o "), UserDecision::Overwrite);
  assert_eq!(board::parse_answer("l"), UserDecision::OverwriteAll);
  assert_eq!(board::parse_answer("c"), UserDecision::Cancel);
  assert_eq!(board::parse_answer(""), UserDecision::Skip);
}

#[test]
fn config_file_overrides_defaults() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("bee.toml");
  std::fs::write(&path, "undo_limit = 5\n").unwrap();

  let config = BoardConfig::load(Some(&path)).unwrap();
  assert_eq!(config.undo_limit, 5);
  assert_eq!(config.write_attempts, BoardConfig::default().write_attempts);
  assert_eq!(config.archive_options().write_attempts, config.write_attempts);
}

#[test]
fn named_config_file_must_exist() {
  let dir = tempfile::tempdir().unwrap();
  assert!(BoardConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
}

// ─── Operations ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_add_list_export() {
  let dir = tempfile::tempdir().unwrap();
  let config = BoardConfig::default();

  let board_path = board::create(&dir.path().join("mood"), &config).await.unwrap();
  assert_eq!(board_path, dir.path().join("mood.bee"));
  assert!(board::info(&board_path).unwrap().items_by_type.is_empty());

  let image = dir.path().join("swatch.png");
  write_png(&image);
  let outcome = board::add(&board_path, &[image], &["palette".to_owned()], &config)
    .await
    .unwrap();
  assert_eq!(outcome.assigned.len(), 2);

  let (scene, read) = board::load(&board_path, &config).await.unwrap();
  assert!(read.problems.is_empty());
  assert_eq!(scene.len(), 2);
  assert_eq!(scene.items_by_type(ItemKind::Pixmap).len(), 1);
  assert_eq!(scene.items_by_type(ItemKind::Text).len(), 1);
  assert!(scene.items().iter().all(|item| item.transform.z > 0.0));

  let out = dir.path().join("out");
  std::fs::create_dir(&out).unwrap();
  let first = board::export(&board_path, &out, OnConflict::Overwrite, &config)
    .await
    .unwrap();
  assert_eq!(first.written, [out.join("0001-swatch.png")]);

  let second = board::export(&board_path, &out, OnConflict::Skip, &config)
    .await
    .unwrap();
  assert!(second.written.is_empty());
  assert_eq!(second.skipped.len(), 1);
}

#[tokio::test]
async fn adding_to_a_board_keeps_existing_rows() {
  let dir = tempfile::tempdir().unwrap();
  let config = BoardConfig::default();
  let path = board::create(&dir.path().join("b.bee"), &config).await.unwrap();

  board::add(&path, &[], &["one".to_owned()], &config).await.unwrap();
  let outcome = board::add(&path, &[], &["two".to_owned()], &config).await.unwrap();
  assert_eq!(outcome.updated, 1);
  assert!(outcome.deleted.is_empty());

  let info = board::info(&path).unwrap();
  assert_eq!(info.items_by_type.get("text"), Some(&2));
  assert_eq!(board::migrate(&path, &config).unwrap(), info.user_version);
}

#[tokio::test]
async fn loading_rejects_other_files() {
  let dir = tempfile::tempdir().unwrap();
  let config = BoardConfig::default();

  let missing = dir.path().join("missing.bee");
  assert!(board::load(&missing, &config).await.is_err());

  let text = dir.path().join("notes.bee");
  std::fs::write(&text, "just some notes, not a database").unwrap();
  assert!(board::load(&text, &config).await.is_err());

  assert!(board::add(&text, &[], &[], &config).await.is_err());
}

#[tokio::test]
async fn adding_nothing_fails() {
  let dir = tempfile::tempdir().unwrap();
  let config = BoardConfig::default();
  let path = board::create(&dir.path().join("empty"), &config).await.unwrap();
  let err = board::add(&path, &[], &[], &config).await.unwrap_err();
  assert!(err.to_string().contains("nothing to add"));
}
