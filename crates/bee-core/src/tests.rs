//! Tests for the item model, scene, command log, worker and exporter.

use std::io::Cursor;

use image::{
  Delay, DynamicImage, Frame, ImageFormat, Rgba, RgbaImage,
  codecs::gif::GifEncoder,
};
use serde_json::json;

use crate::{
  Error,
  command::Command,
  export::ImagesExporter,
  item::{
    DrawData, Flip, GifData, Item, ItemData, ItemKind, ItemRecord, PenStyle,
    PixmapData, Point, Rect, Transform, sort_by_filename,
  },
  scene::Scene,
  worker::{self, NoProgress, ProgressSink, UserDecision, WorkerEvent},
};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
  let image = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]));
  let mut buf = Cursor::new(Vec::new());
  DynamicImage::ImageRgba8(image)
    .write_to(&mut buf, ImageFormat::Png)
    .unwrap();
  buf.into_inner()
}

fn gif_bytes(frames: usize) -> Vec<u8> {
  let mut buf = Vec::new();
  {
    let mut encoder = GifEncoder::new(&mut buf);
    let frames = (0..frames).map(|i| {
      let shade = (i * 40) as u8;
      Frame::from_parts(
        RgbaImage::from_pixel(8, 6, Rgba([shade, shade, shade, 255])),
        0,
        0,
        Delay::from_numer_denom_ms(100, 1),
      )
    });
    encoder.encode_frames(frames).unwrap();
  }
  buf
}

fn pixmap(name: &str) -> Item {
  let data = PixmapData::from_bytes(png_bytes(4, 3), Some(name.into())).unwrap();
  Item::pixmap(data)
}

fn record(
  type_tag: &str,
  data: serde_json::Value,
  blob: Option<Vec<u8>>,
) -> ItemRecord {
  ItemRecord {
    save_id: Some(7),
    type_tag: type_tag.into(),
    transform: Transform {
      x:        3.0,
      y:        4.0,
      z:        0.5,
      scale:    2.0,
      rotation: 45.0,
      flip:     Flip::Mirrored,
    },
    data,
    blob,
  }
}

// ─── Item model ──────────────────────────────────────────────────────────────

#[test]
fn type_tags_round_trip() {
  for kind in ItemKind::ALL {
    assert_eq!(ItemKind::from_tag(kind.type_tag()).unwrap(), kind);
  }
  assert!(matches!(
    ItemKind::from_tag("sticker"),
    Err(Error::UnknownItemType(tag)) if tag == "sticker"
  ));
}

#[test]
fn flip_reads_negative_values_as_mirrored() {
  assert_eq!(Flip::from_i64(-1), Flip::Mirrored);
  assert_eq!(Flip::from_i64(1), Flip::Normal);
  assert_eq!(Flip::from_i64(0), Flip::Normal);
  assert_eq!(Flip::Mirrored.as_i64(), -1);
}

#[test]
fn pixmap_decodes_dimensions_and_defaults() {
  let data = PixmapData::from_bytes(png_bytes(10, 5), None).unwrap();
  assert_eq!((data.width(), data.height()), (10, 5));
  assert_eq!(data.extension(), "png");
  assert_eq!(data.crop(), Rect::new(0.0, 0.0, 10.0, 5.0));
  assert_eq!(data.opacity, 1.0);
  assert!(!data.grayscale);
}

#[test]
fn pixmap_rejects_garbage() {
  assert!(PixmapData::from_bytes(b"not an image".to_vec(), None).is_err());
}

#[test]
fn image_bytes_pick_their_variant() {
  let still = Item::image(png_bytes(2, 2), Some("a.png".into())).unwrap();
  assert_eq!(still.kind(), ItemKind::Pixmap);
  assert_eq!(still.image_format(), Some("png"));

  let animated = Item::image(gif_bytes(2), None).unwrap();
  assert_eq!(animated.kind(), ItemKind::Gif);

  assert!(Item::image(b"plain text".to_vec(), None).is_err());
}

#[test]
fn pixmap_crop_is_clamped_to_bounds() {
  let data = PixmapData::from_bytes(png_bytes(10, 10), None).unwrap();
  let crop = data.clamp_crop(Rect::new(-5.0, 2.0, 8.0, 20.0)).unwrap();
  assert_eq!(crop, Rect::new(0.0, 2.0, 3.0, 8.0));
  assert!(matches!(
    data.clamp_crop(Rect::new(20.0, 20.0, 5.0, 5.0)),
    Err(Error::InvalidCrop(_))
  ));
  assert!(data.clamp_crop(Rect::new(f64::NAN, 0.0, 1.0, 1.0)).is_err());
}

#[test]
fn gif_counts_frames_and_clamps_current_frame() {
  let mut data = GifData::from_bytes(gif_bytes(3), Some("anim.gif".into())).unwrap();
  assert_eq!(data.frame_count(), 3);
  assert_eq!((data.width(), data.height()), (8, 6));

  data.set_current_frame(10);
  assert_eq!(data.current_frame(), 2);
  data.next_frame();
  assert_eq!(data.current_frame(), 0);
  data.previous_frame();
  assert_eq!(data.current_frame(), 2);
}

#[test]
fn pixmap_payload_round_trips_through_record() {
  let mut item = pixmap("cat.png");
  item.transform = Transform {
    x:        10.0,
    y:        -2.5,
    z:        3.0,
    scale:    0.1,
    rotation: 359.9,
    flip:     Flip::Mirrored,
  };
  item.save_id = Some(7);
  if let ItemData::Pixmap(p) = &mut item.data {
    p.opacity = 0.25;
    p.grayscale = true;
    p.set_crop(Rect::new(1.0, 1.0, 2.0, 1.0));
  }

  let record = ItemRecord {
    save_id:   item.save_id,
    type_tag:  item.type_tag().into(),
    transform: item.transform,
    data:      item.get_extra_save_data().unwrap(),
    blob:      item.binary_payload().map(<[u8]>::to_vec),
  };
  let decoded = Item::from_record(&record).unwrap();

  assert_eq!(decoded.save_id, Some(7));
  assert_eq!(decoded.transform, item.transform);
  assert_eq!(decoded.get_extra_save_data().unwrap(), record.data);
  assert_eq!(decoded.binary_payload(), item.binary_payload());
}

#[test]
fn stored_crops_are_clamped_on_load() {
  let crop_of = |crop: serde_json::Value| {
    let stored = record("pixmap", json!({ "crop": crop }), Some(png_bytes(4, 3)));
    match Item::from_record(&stored).unwrap().data {
      ItemData::Pixmap(p) => p.crop(),
      other => panic!("decoded {other:?}"),
    }
  };
  let whole = Rect::new(0.0, 0.0, 4.0, 3.0);

  assert_eq!(crop_of(json!([-1.0, 1.0, 3.0, 10.0])), Rect::new(0.0, 1.0, 2.0, 2.0));
  assert_eq!(crop_of(json!([9.0, 9.0, 2.0, 2.0])), whole);
  assert_eq!(crop_of(json!([1.0, 1.0, 0.0, 2.0])), whole);
  assert_eq!(crop_of(json!(null)), whole);
}

#[test]
fn text_and_draw_payloads_decode() {
  let text = Item::from_record(&record(
    "text",
    json!({ "text": "hello", "color": "#ff0000" }),
    None,
  ))
  .unwrap();
  let ItemData::Text(data) = &text.data else { panic!("expected text") };
  assert_eq!(data.text, "hello");
  assert_eq!(data.color.as_deref(), Some("#ff0000"));
  assert_eq!(text.transform.flip, Flip::Mirrored);

  let draw = Item::from_record(&record(
    "draw",
    json!({
      "path": [{ "x": 0.0, "y": 0.0 }, { "x": 5.0, "y": 1.0 }],
      "pen_width": 400,
      "pen_style": "<->",
    }),
    None,
  ))
  .unwrap();
  let ItemData::Draw(data) = &draw.data else { panic!("expected draw") };
  assert_eq!(data.path, vec![Point::new(0.0, 0.0), Point::new(5.0, 1.0)]);
  assert_eq!(data.pen_width, 50);
  assert_eq!(data.pen_style, PenStyle::ArrowBoth);
  assert_eq!(data.pen_color, "#c8c8c8");
}

#[test]
fn null_payload_uses_defaults() {
  let item =
    Item::from_record(&record("text", serde_json::Value::Null, None)).unwrap();
  let ItemData::Text(data) = &item.data else { panic!("expected text") };
  assert_eq!(data.text, "Text");

  let draw = Item::from_record(&record("draw", json!({}), None)).unwrap();
  assert_eq!(draw.get_extra_save_data().unwrap()["pen_width"], 8);
}

#[test]
fn bad_rows_fail_to_decode() {
  let rows = [
    record("pixmap", json!({}), Some(b"junk".to_vec())),
    record("pixmap", json!({}), None),
    record("gif", json!({}), Some(png_bytes(2, 2))),
    record("text", json!({ "text": 5 }), None),
    record("hologram", json!({}), None),
  ];
  for row in &rows {
    assert!(Item::from_record(row).is_err(), "{} decoded", row.type_tag);
  }
}

#[test]
fn load_error_text_names_the_file() {
  let rec = record(
    "pixmap",
    json!({ "filename": "/tmp/broken.png" }),
    Some(vec![1, 2]),
  );
  let text = rec.load_error_text();
  assert!(text.starts_with("Image could not be loaded: /tmp/broken.png"));

  let rec = record("text", json!({ "text": 5 }), None);
  assert_eq!(rec.load_error_text(), "Item could not be loaded: #7 (text)");
}

#[test]
fn error_placeholder_never_flips() {
  let mut item = Item::error_placeholder(
    "broken",
    Some(3),
    Transform { flip: Flip::Mirrored, ..Transform::default() },
  );
  assert_eq!(item.flip(), Flip::Normal);
  item.do_flip();
  assert_eq!(item.flip(), Flip::Normal);
  assert!(!item.is_persistable());
  assert_eq!(item.original_save_id(), Some(3));
  assert_eq!(item.save_id, None);
}

#[test]
fn export_filenames() {
  let mut item = pixmap("/home/me/photos/cat.png");
  assert!(matches!(
    item.get_filename_for_export("png", None),
    Err(Error::MissingSaveId)
  ));
  let name = item.get_filename_for_export("png", Some(3)).unwrap();
  assert_eq!(name, "0003-cat.png");

  item.save_id = Some(12);
  let name = item.get_filename_for_export("png", Some(3)).unwrap();
  assert_eq!(name, "0012-cat.png");

  if let ItemData::Pixmap(p) = &mut item.data {
    p.filename = None;
  }
  assert_eq!(item.get_filename_for_export("jpg", None).unwrap(), "0012.jpg");
}

#[test]
fn copies_get_a_fresh_identity() {
  let mut item = Item::text("note");
  item.save_id = Some(4);
  item.transform = Transform::at(5.0, 6.0);

  let copy = item.create_copy();
  assert_ne!(copy.id(), item.id());
  assert_eq!(copy.save_id, None);
  assert_eq!(copy.transform, item.transform);
  assert_eq!(
    copy.get_extra_save_data().unwrap(),
    item.get_extra_save_data().unwrap()
  );
}

#[test]
fn sorting_for_export() {
  let b = pixmap("b.png");
  let a = pixmap("a.png");
  let mut saved = Item::text("saved");
  saved.save_id = Some(2);
  let mut saved_first = Item::text("saved first");
  saved_first.save_id = Some(1);
  let loose = Item::draw(DrawData::default());

  let expected = vec![a.id(), b.id(), saved_first.id(), saved.id(), loose.id()];
  let items = [loose, saved, b, saved_first, a];
  let order: Vec<_> =
    sort_by_filename(&items).into_iter().map(Item::id).collect();
  assert_eq!(order, expected);
}

// ─── Scene ───────────────────────────────────────────────────────────────────

#[test]
fn deferred_items_wait_for_the_interactive_thread() {
  let mut scene = Scene::default();
  let queue = scene.load_queue();
  let worker = std::thread::spawn(move || {
    for i in 0..3 {
      queue.push(Item::text(format!("note {i}")));
    }
  });
  worker.join().unwrap();

  assert!(scene.is_empty());
  let added = scene.add_queued_items();
  assert_eq!(added.len(), 3);
  assert_eq!(scene.len(), 3);
  assert!(scene.load_queue().is_empty());
}

#[test]
fn items_for_save_skip_placeholders() {
  let mut scene = Scene::default();
  scene.add_item_later(Item::text("keep"));
  scene.add_item_later(Item::error_placeholder(
    "lost",
    Some(9),
    Transform::default(),
  ));
  scene.add_queued_items();

  assert_eq!(scene.items_for_save().len(), 1);
  let snapshot = scene.snapshot_for_save();
  assert_eq!(snapshot.items.len(), 1);
  assert_eq!(snapshot.protected.into_iter().collect::<Vec<_>>(), vec![9]);
}

#[test]
fn save_ids_are_applied_and_cleared() {
  let mut scene = Scene::default();
  let item = Item::text("a");
  let id = item.id();
  scene.push(Command::insert_items(vec![item]));

  scene.apply_save_ids(&[(id, 5)]);
  assert_eq!(scene.get(id).unwrap().save_id, Some(5));
  scene.clear_save_ids();
  assert_eq!(scene.get(id).unwrap().save_id, None);
}

#[test]
fn save_ids_held_by_undo_history_follow_the_archive() {
  let mut scene = Scene::default();
  let (a, b, c) = (Item::text("a"), Item::text("b"), Item::text("c"));
  let (a_id, b_id, c_id) = (a.id(), b.id(), c.id());
  scene.push(Command::insert_items(vec![a, b, c]));
  scene.apply_save_ids(&[(a_id, 1), (b_id, 2), (c_id, 3)]);
  let placeholder = Item::error_placeholder("broken", Some(4), Transform::default());
  let placeholder_id = placeholder.id();
  scene.push(Command::insert_items(vec![placeholder]));
  scene.push(Command::batch("Tidy", vec![
    Command::delete_items(vec![a_id]),
    Command::delete_items(vec![b_id, placeholder_id]),
  ]));

  // Rows 1 and 4 were deleted by a save.
  scene.forget_save_ids(&[1, 4]);
  scene.undo();
  assert_eq!(scene.get(a_id).unwrap().save_id, None);
  assert_eq!(scene.get(b_id).unwrap().save_id, Some(2));
  assert_eq!(scene.get(c_id).unwrap().save_id, Some(3));
  assert_eq!(scene.get(placeholder_id).unwrap().original_save_id(), None);

  // An item removed while its save ran still receives its row.
  scene.redo();
  scene.apply_save_ids(&[(a_id, 9)]);
  scene.undo();
  assert_eq!(scene.get(a_id).unwrap().save_id, Some(9));

  // Saving to another file detaches deleted items as well.
  scene.redo();
  scene.clear_save_ids();
  assert_eq!(scene.get(c_id).unwrap().save_id, None);
  scene.undo();
  assert_eq!(scene.get(a_id).unwrap().save_id, None);
  assert_eq!(scene.get(b_id).unwrap().save_id, None);
}

#[test]
fn selection_follows_deletes() {
  let mut scene = Scene::default();
  let a = Item::text("a");
  let b = Item::text("b");
  let (a_id, b_id) = (a.id(), b.id());
  scene.push(Command::insert_items(vec![a, b]));

  scene.select_all();
  assert!(scene.has_selection());
  assert!(!scene.has_single_selection());

  scene.push(Command::delete_items(vec![a_id]));
  assert_eq!(scene.selected_ids(), vec![b_id]);
  assert!(scene.has_single_selection());

  scene.undo();
  assert!(scene.get(a_id).is_some());
  assert!(!scene.is_selected(a_id));
}

#[test]
fn z_order_helpers() {
  let mut scene = Scene::default();
  let low = Item::text("low").with_transform(Transform::default().with_z(-1.0));
  let high = Item::text("high").with_transform(Transform::default().with_z(2.0));
  let (low_id, high_id) = (low.id(), high.id());
  scene.push(Command::insert_items(vec![high, low]));

  assert_eq!(scene.max_z(), 2.0);
  assert_eq!(scene.min_z(), -1.0);
  let order: Vec<_> =
    scene.items_in_z_order().into_iter().map(Item::id).collect();
  assert_eq!(order, vec![low_id, high_id]);

  let raise = Command::raise_to_top(scene.items(), &[low_id]);
  scene.push(raise);
  assert!(scene.get(low_id).unwrap().transform.z > 2.0);
}

// ─── Command log ─────────────────────────────────────────────────────────────

fn state(scene: &Scene) -> Vec<(Transform, serde_json::Value)> {
  scene
    .items()
    .iter()
    .map(|item| (item.transform, item.get_extra_save_data().unwrap()))
    .collect()
}

#[test]
fn undo_restores_exact_state() {
  let mut scene = Scene::default();
  let image = pixmap("cat.png");
  let note = Item::text("hello");
  let (image_id, note_id) = (image.id(), note.id());
  scene.push(Command::insert_items(vec![image, note]));
  scene.mark_clean();
  let before = state(&scene);

  let ids = [image_id, note_id];
  let commands = vec![
    Command::move_items(scene.items(), &ids, 10.5, -3.25),
    Command::scale_items(scene.items(), &ids, 1.7),
    Command::rotate_items(scene.items(), &ids, 275.0),
    Command::flip_items(vec![image_id]),
    Command::crop(scene.items(), image_id, Rect::new(1.0, 0.0, 2.0, 2.0)).unwrap(),
    Command::change_text(scene.items(), note_id, "changed").unwrap(),
    Command::change_opacity(scene.items(), &ids, 0.3),
    Command::toggle_grayscale(scene.items(), &ids, true),
  ];
  let count = commands.len();
  for command in commands {
    scene.push(command);
  }
  assert_ne!(state(&scene), before);
  assert!(!scene.is_clean());

  for _ in 0..count {
    scene.undo();
  }
  assert_eq!(state(&scene), before);
  assert!(scene.is_clean());
}

#[test]
fn delete_undo_restores_positions() {
  let mut scene = Scene::default();
  let items: Vec<_> = (0..4).map(|i| Item::text(format!("{i}"))).collect();
  let ids: Vec<_> = items.iter().map(Item::id).collect();
  scene.push(Command::insert_items(items));

  scene.push(Command::delete_items(vec![ids[2], ids[0]]));
  assert_eq!(scene.len(), 2);
  scene.undo();

  let order: Vec<_> = scene.items().iter().map(Item::id).collect();
  assert_eq!(order, ids);

  scene.redo();
  let order: Vec<_> = scene.items().iter().map(Item::id).collect();
  assert_eq!(order, vec![ids[1], ids[3]]);
}

#[test]
fn batch_is_one_step() {
  let mut scene = Scene::default();
  let a = Item::text("a");
  let a_id = a.id();
  let batch = Command::batch("Insert and move", vec![
    Command::insert_items(vec![a]),
    Command::TransformItems {
      label:   "Move items",
      changes: vec![crate::command::TransformChange {
        id:     a_id,
        before: Transform::default(),
        after:  Transform::at(4.0, 4.0),
      }],
    },
  ]);
  scene.push(batch);
  assert_eq!(scene.get(a_id).unwrap().transform.pos(), Point::new(4.0, 4.0));
  assert_eq!(scene.history().undo_text(), Some("Insert and move"));

  scene.undo();
  assert!(scene.is_empty());
  scene.redo();
  assert_eq!(scene.get(a_id).unwrap().transform.pos(), Point::new(4.0, 4.0));
}

#[test]
fn wrong_item_types_are_rejected() {
  let mut scene = Scene::default();
  let note = Item::text("a");
  let note_id = note.id();
  scene.push(Command::insert_items(vec![note]));

  assert!(matches!(
    Command::crop(scene.items(), note_id, Rect::new(0.0, 0.0, 1.0, 1.0)),
    Err(Error::WrongItemType { expected: "pixmap", found: "text" })
  ));
  assert!(matches!(
    Command::change_text(scene.items(), crate::item::ItemId::new(), "x"),
    Err(Error::ItemNotFound(_))
  ));
}

#[test]
fn history_is_bounded_and_forgets_clean_state() {
  let mut scene = Scene::new(3);
  assert!(scene.is_clean());
  let note = Item::text("a");
  let id = note.id();
  scene.push(Command::insert_items(vec![note]));

  for _ in 0..3 {
    let step = Command::move_items(scene.items(), &[id], 1.0, 0.0);
    scene.push(step);
  }
  assert_eq!(scene.history().len(), 3);
  while scene.history().can_undo() {
    scene.undo();
  }
  // The insert fell off the end of the log, so the empty board that was clean
  // can't be reached again.
  assert_eq!(scene.len(), 1);
  assert_eq!(scene.get(id).unwrap().transform.x, 0.0);
  assert!(!scene.is_clean());
}

#[test]
fn new_command_discards_redo_tail() {
  let mut scene = Scene::default();
  let note = Item::text("a");
  let id = note.id();
  scene.push(Command::insert_items(vec![note]));
  let step = Command::move_items(scene.items(), &[id], 1.0, 0.0);
  scene.push(step);
  scene.undo();
  assert!(scene.history().can_redo());

  scene.push(Command::flip_items(vec![id]));
  assert!(!scene.history().can_redo());
  assert_eq!(scene.history().len(), 2);
}

// ─── Worker ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn worker_reports_progress_then_finishes_once() {
  let mut handle = worker::spawn(|sink| {
    sink.begin(3);
    for i in 0..3 {
      sink.progress(i);
    }
    Ok::<_, Error>("done")
  });

  let mut events = Vec::new();
  while let Some(event) = handle.next_event().await {
    events.push(event);
  }
  assert!(matches!(events[0], WorkerEvent::Begin { total: 3 }));
  let indices: Vec<_> = events
    .iter()
    .filter_map(|e| match e {
      WorkerEvent::Progress { index } => Some(*index),
      _ => None,
    })
    .collect();
  assert_eq!(indices, vec![0, 1, 2]);
  let finished: Vec<_> = events
    .into_iter()
    .filter_map(|e| match e {
      WorkerEvent::Finished(f) => Some(f),
      _ => None,
    })
    .collect();
  assert_eq!(finished.len(), 1);
  assert_eq!(finished[0].output, Some("done"));
  assert!(finished[0].is_success());
}

#[tokio::test]
async fn worker_failures_arrive_as_finished() {
  let finished =
    worker::spawn(|_| Err::<(), _>(Error::MissingSaveId)).wait().await;
  assert!(finished.output.is_none());
  assert_eq!(finished.errors.len(), 1);

  let finished = worker::spawn(|_| -> Result<(), Error> { panic!("boom") })
    .wait()
    .await;
  assert_eq!(finished.errors, vec!["worker panicked".to_owned()]);
}

#[tokio::test]
async fn worker_cancellation_is_cooperative() {
  let handle = worker::spawn(|sink| {
    let mut processed = 0;
    while !sink.is_canceled() {
      processed += 1;
      std::thread::sleep(std::time::Duration::from_millis(1));
    }
    Ok::<_, Error>(processed)
  });
  handle.cancel();
  let finished = handle.wait().await;
  assert!(finished.is_success());
  assert!(finished.output.is_some());
}

// ─── Export ──────────────────────────────────────────────────────────────────

#[test]
fn exporter_writes_images_only() {
  let dir = tempfile::tempdir().unwrap();
  let mut saved = pixmap("/pics/cat.png");
  saved.save_id = Some(4);
  let unsaved = Item::gif(GifData::from_bytes(gif_bytes(2), None).unwrap());
  let items = [Item::text("not exported"), saved, unsaved];

  let exporter = ImagesExporter::new(dir.path(), &items);
  assert_eq!(exporter.len(), 2);
  let summary = exporter.export(&NoProgress).unwrap();

  let mut names: Vec<_> = summary
    .written
    .iter()
    .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
    .collect();
  names.sort();
  assert_eq!(names, vec!["0002.gif", "0004-cat.png"]);
  let written = std::fs::read(dir.path().join("0004-cat.png")).unwrap();
  assert_eq!(written, items[1].binary_payload().unwrap());
}

struct Answer(UserDecision, std::cell::Cell<usize>);

impl ProgressSink for Answer {
  fn ask(&self, _context: &str) -> UserDecision {
    self.1.set(self.1.get() + 1);
    self.0
  }
}

#[test]
fn exporter_asks_before_overwriting() {
  let dir = tempfile::tempdir().unwrap();
  let mut items: Vec<_> = ["a.png", "b.png"].into_iter().map(pixmap).collect();
  for (i, item) in items.iter_mut().enumerate() {
    item.save_id = Some(i as i64 + 1);
  }
  std::fs::write(dir.path().join("0001-a.png"), b"old").unwrap();
  std::fs::write(dir.path().join("0002-b.png"), b"old").unwrap();
  let exporter = ImagesExporter::new(dir.path(), &items);

  let sink = Answer(UserDecision::Skip, Default::default());
  let summary = exporter.export(&sink).unwrap();
  assert_eq!(sink.1.get(), 2);
  assert_eq!(summary.skipped.len(), 2);
  assert_eq!(std::fs::read(dir.path().join("0001-a.png")).unwrap(), b"old");

  let sink = Answer(UserDecision::OverwriteAll, Default::default());
  let summary = exporter.export(&sink).unwrap();
  assert_eq!(sink.1.get(), 1);
  assert_eq!(summary.written.len(), 2);
  assert_ne!(std::fs::read(dir.path().join("0002-b.png")).unwrap(), b"old");
}

#[tokio::test]
async fn exporter_questions_travel_through_the_worker() {
  let dir = tempfile::tempdir().unwrap();
  let mut item = pixmap("a.png");
  item.save_id = Some(1);
  std::fs::write(dir.path().join("0001-a.png"), b"old").unwrap();
  let exporter = ImagesExporter::new(dir.path(), [&item]);

  let mut handle = worker::spawn(move |sink| exporter.export(sink));
  let mut asked = Vec::new();
  let mut result = None;
  while let Some(event) = handle.next_event().await {
    match event {
      WorkerEvent::UserInputRequired { context, reply } => {
        asked.push(context);
        reply.send(UserDecision::Overwrite).unwrap();
      }
      WorkerEvent::Finished(finished) => result = Some(finished),
      _ => {}
    }
  }
  assert_eq!(asked.len(), 1);
  assert!(asked[0].ends_with("0001-a.png"));
  let summary = result.unwrap().output.unwrap();
  assert_eq!(summary.written.len(), 1);
}

#[test]
fn exporter_needs_an_existing_directory() {
  let dir = tempfile::tempdir().unwrap();
  let item = pixmap("a.png");
  let exporter = ImagesExporter::new(dir.path().join("missing"), [&item]);
  assert!(matches!(exporter.export(&NoProgress), Err(Error::Io(_))));
}
