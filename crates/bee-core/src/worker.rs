//! Running long operations off the interactive thread.
//!
//! An operation is written once against [`ProgressSink`]. Run directly with
//! [`NoProgress`] it behaves like any blocking function; run through
//! [`spawn`] it executes on a blocking worker thread and reports
//! [`WorkerEvent`]s back to whoever holds the [`WorkerHandle`].
//!
//! Every spawned run ends with exactly one [`WorkerEvent::Finished`], whether
//! the operation succeeds, fails, is cancelled or panics.

use std::{
  cell::{Cell, RefCell},
  fmt,
  panic::{self, AssertUnwindSafe},
};

use tokio::{
  sync::{mpsc, oneshot},
  task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// ─── ProgressSink ────────────────────────────────────────────────────────────

/// Answer to a question raised with [`ProgressSink::ask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserDecision {
  #[default]
  Skip,
  SkipAll,
  Overwrite,
  OverwriteAll,
  Cancel,
}

/// Callbacks an operation reports through. All methods have do-nothing
/// defaults.
pub trait ProgressSink {
  /// Called once, before the first unit of work.
  fn begin(&self, _total: usize) {}

  /// `index` of the unit just processed, starting at zero.
  fn progress(&self, _index: usize) {}

  /// Polled between units of work.
  fn is_canceled(&self) -> bool { false }

  /// Block until the user decides what to do about `context`.
  fn ask(&self, _context: &str) -> UserDecision { UserDecision::Skip }

  /// A problem that doesn't stop the operation.
  fn report_error(&self, message: String) {
    warn!(%message, "operation reported an error");
  }
}

/// For synchronous callers that don't track progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

// ─── Events ──────────────────────────────────────────────────────────────────

/// How a run ended. A non-empty `errors` list means it failed.
#[derive(Debug)]
pub struct Finished<T> {
  pub output: Option<T>,
  pub errors: Vec<String>,
}

impl<T> Finished<T> {
  pub fn is_success(&self) -> bool { self.errors.is_empty() }
}

#[derive(Debug)]
pub enum WorkerEvent<T> {
  Begin { total: usize },
  Progress { index: usize },
  /// The worker is blocked until `reply` is answered or dropped. Dropping it
  /// counts as [`UserDecision::Skip`].
  UserInputRequired {
    context: String,
    reply:   oneshot::Sender<UserDecision>,
  },
  Finished(Finished<T>),
}

// ─── Reporter ────────────────────────────────────────────────────────────────

/// The [`ProgressSink`] handed to spawned operations.
pub struct Reporter<T> {
  events:        mpsc::UnboundedSender<WorkerEvent<T>>,
  cancel:        CancellationToken,
  last_progress: Cell<Option<usize>>,
  errors:        RefCell<Vec<String>>,
}

impl<T> Reporter<T> {
  fn new(
    events: mpsc::UnboundedSender<WorkerEvent<T>>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      events,
      cancel,
      last_progress: Cell::new(None),
      errors: RefCell::new(Vec::new()),
    }
  }

  fn send(&self, event: WorkerEvent<T>) {
    // Nobody listening is fine; the operation still runs to completion.
    let _ = self.events.send(event);
  }

  fn finish(self, output: Option<T>, mut fatal: Vec<String>) {
    let mut errors = self.errors.into_inner();
    errors.append(&mut fatal);
    let _ = self.events.send(WorkerEvent::Finished(Finished { output, errors }));
  }
}

impl<T> ProgressSink for Reporter<T> {
  fn begin(&self, total: usize) { self.send(WorkerEvent::Begin { total }); }

  fn progress(&self, index: usize) {
    if self.last_progress.get().is_some_and(|last| index <= last) {
      debug!(index, "ignoring out-of-order progress");
      return;
    }
    self.last_progress.set(Some(index));
    self.send(WorkerEvent::Progress { index });
    std::thread::yield_now();
  }

  fn is_canceled(&self) -> bool { self.cancel.is_cancelled() }

  fn ask(&self, context: &str) -> UserDecision {
    let (reply, answer) = oneshot::channel();
    self.send(WorkerEvent::UserInputRequired { context: context.to_owned(), reply });
    answer.blocking_recv().unwrap_or_default()
  }

  fn report_error(&self, message: String) {
    warn!(%message, "operation reported an error");
    self.errors.borrow_mut().push(message);
  }
}

// ─── WorkerHandle ────────────────────────────────────────────────────────────

pub struct WorkerHandle<T> {
  events: mpsc::UnboundedReceiver<WorkerEvent<T>>,
  cancel: CancellationToken,
  join:   JoinHandle<()>,
}

impl<T> WorkerHandle<T> {
  /// Ask the operation to stop at its next checkpoint.
  pub fn cancel(&self) { self.cancel.cancel(); }

  pub fn cancellation_token(&self) -> CancellationToken { self.cancel.clone() }

  /// The next event, or `None` once `Finished` has been delivered.
  pub async fn next_event(&mut self) -> Option<WorkerEvent<T>> {
    self.events.recv().await
  }

  /// Drive the run to completion, answering every question with `policy`.
  pub async fn wait_with(mut self, policy: UserDecision) -> Finished<T> {
    let mut finished = None;
    while let Some(event) = self.events.recv().await {
      match event {
        WorkerEvent::UserInputRequired { reply, .. } => {
          let _ = reply.send(policy);
        }
        WorkerEvent::Finished(result) => finished = Some(result),
        WorkerEvent::Begin { .. } | WorkerEvent::Progress { .. } => {}
      }
    }
    if let Err(err) = self.join.await {
      warn!(%err, "worker task did not shut down cleanly");
    }
    finished.unwrap_or_else(|| Finished {
      output: None,
      errors: vec!["worker exited without reporting".to_owned()],
    })
  }

  /// [`WorkerHandle::wait_with`] answering [`UserDecision::Skip`].
  pub async fn wait(self) -> Finished<T> { self.wait_with(UserDecision::Skip).await }
}

impl<T> fmt::Debug for WorkerHandle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerHandle")
      .field("canceled", &self.cancel.is_cancelled())
      .field("finished", &self.join.is_finished())
      .finish()
  }
}

// ─── spawn ───────────────────────────────────────────────────────────────────

/// Run `op` on the blocking thread pool. Must be called from within a tokio
/// runtime.
pub fn spawn<T, E, F>(op: F) -> WorkerHandle<T>
where
  T: Send + 'static,
  E: fmt::Display,
  F: FnOnce(&Reporter<T>) -> Result<T, E> + Send + 'static,
{
  let (tx, rx) = mpsc::unbounded_channel();
  let cancel = CancellationToken::new();
  let reporter = Reporter::new(tx, cancel.clone());

  let join = tokio::task::spawn_blocking(move || {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| op(&reporter)));
    match outcome {
      Ok(Ok(output)) => reporter.finish(Some(output), Vec::new()),
      Ok(Err(err)) => reporter.finish(None, vec![err.to_string()]),
      Err(_) => reporter.finish(None, vec!["worker panicked".to_owned()]),
    }
  });

  WorkerHandle { events: rx, cancel, join }
}
