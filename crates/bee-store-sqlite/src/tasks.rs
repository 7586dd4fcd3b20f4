//! Loading and saving on the worker thread pool.
//!
//! The archive is moved into the worker for the duration of the run and
//! closed when it ends.

use bee_core::{
  scene::{LoadQueue, SaveSnapshot, Scene},
  worker::{self, WorkerHandle},
};

use crate::archive::{ArchiveIo, ReadOutcome, WriteOutcome};

/// Read `io` into `queue` in the background. Drain the queue with
/// [`Scene::add_queued_items`] as events arrive.
pub fn spawn_read(mut io: ArchiveIo, queue: LoadQueue) -> WorkerHandle<ReadOutcome> {
  worker::spawn(move |sink| io.read(&queue, sink))
}

/// Load the archive into `scene`'s queue in the background.
pub fn spawn_load(io: ArchiveIo, scene: &Scene) -> WorkerHandle<ReadOutcome> {
  spawn_read(io, scene.load_queue())
}

/// Write `snapshot` in the background. Apply the result to the scene with
/// [`apply_write`](crate::apply_write).
pub fn spawn_write(
  mut io: ArchiveIo,
  snapshot: SaveSnapshot,
) -> WorkerHandle<WriteOutcome> {
  worker::spawn(move |sink| io.write(&snapshot, sink))
}

/// Save `scene` in the background.
pub fn spawn_save(io: ArchiveIo, scene: &Scene) -> WorkerHandle<WriteOutcome> {
  spawn_write(io, scene.snapshot_for_save())
}
