//! Conversion between archive rows and items.
//!
//! Geometry goes into typed columns; the rest of an item is the JSON `data`
//! column plus, for images, a blob in `sqlar`.

use bee_core::item::{Flip, Item, ItemRecord, Transform};
use tracing::warn;

use crate::error::Fault;

// ─── Reading ─────────────────────────────────────────────────────────────────

/// Selects every item with its blob, if any, in id order. Columns match
/// [`RawItemRow::from_row`].
pub(crate) const SELECT_ITEMS: &str = "
SELECT items.id, items.type, items.x, items.y, items.z, items.scale,
       items.rotation, items.flip, items.data, sqlar.data
FROM items
LEFT JOIN sqlar ON sqlar.item_id = items.id
ORDER BY items.id";

/// Column values of one `items` row joined with its blob.
pub(crate) struct RawItemRow {
  pub id:       i64,
  pub type_tag: String,
  pub x:        Option<f64>,
  pub y:        Option<f64>,
  pub z:        Option<f64>,
  pub scale:    Option<f64>,
  pub rotation: Option<f64>,
  pub flip:     Option<i64>,
  pub data:     Option<String>,
  pub blob:     Option<Vec<u8>>,
}

impl RawItemRow {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:       row.get(0)?,
      type_tag: row.get(1)?,
      x:        row.get(2)?,
      y:        row.get(3)?,
      z:        row.get(4)?,
      scale:    row.get(5)?,
      rotation: row.get(6)?,
      flip:     row.get(7)?,
      data:     row.get(8)?,
      blob:     row.get(9)?,
    })
  }

  /// NULL columns fall back to the schema defaults.
  fn transform(&self) -> Transform {
    Transform {
      x:        self.x.unwrap_or(0.0),
      y:        self.y.unwrap_or(0.0),
      z:        self.z.unwrap_or(0.0),
      scale:    self.scale.unwrap_or(1.0),
      rotation: self.rotation.unwrap_or(0.0),
      flip:     self.flip.map(Flip::from_i64).unwrap_or_default(),
    }
  }

  /// Decode the row. A row that can't be turned into its item becomes an
  /// error placeholder that keeps the row alive; the second value then
  /// describes the problem.
  pub fn into_item(self) -> (Item, Option<String>) {
    let transform = self.transform();
    let parsed: Result<serde_json::Value, _> = self
      .data
      .as_deref()
      .map(serde_json::from_str)
      .transpose()
      .map(Option::unwrap_or_default);

    let record = ItemRecord {
      save_id: Some(self.id),
      type_tag: self.type_tag,
      transform,
      data: parsed.as_ref().cloned().unwrap_or_default(),
      blob: self.blob,
    };

    let decoded = parsed.map_err(Fault::from).and_then(|_| {
      Item::from_record(&record).map_err(Fault::from)
    });
    match decoded {
      Ok(item) => (item, None),
      Err(err) => {
        let text = record.load_error_text();
        warn!(
          save_id = self.id,
          type_tag = %record.type_tag,
          %err,
          "could not load item"
        );
        let problem = format!("{}: {err}", problem_label(&record));
        (Item::error_placeholder(text, Some(self.id), transform), Some(problem))
      }
    }
  }
}

fn problem_label(record: &ItemRecord) -> String {
  match (record.filename_hint(), record.save_id) {
    (Some(name), _) => name.to_owned(),
    (None, Some(id)) => format!("item #{id}"),
    (None, None) => "item".to_owned(),
  }
}

// ─── Writing ─────────────────────────────────────────────────────────────────

/// Column values written for one item.
pub(crate) struct ItemColumns {
  pub type_tag: &'static str,
  pub x:        f64,
  pub y:        f64,
  pub z:        f64,
  pub scale:    f64,
  pub rotation: f64,
  pub flip:     i64,
  pub data:     String,
}

impl ItemColumns {
  pub fn from_item(item: &Item) -> Result<Self, Fault> {
    let t = item.transform;
    Ok(Self {
      type_tag: item.type_tag(),
      x:        t.x,
      y:        t.y,
      z:        t.z,
      scale:    t.scale,
      rotation: t.rotation,
      flip:     item.flip().as_i64(),
      data:     serde_json::to_string(&item.get_extra_save_data()?)?,
    })
  }
}
