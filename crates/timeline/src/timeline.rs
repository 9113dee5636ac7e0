//! Orchestrator that serializes all mutation of the stroke log.
//!
//! [`DrawingTimeline`] owns the stroke counter, the drawing cursor, the
//! history graph, the snapshot index and the mode timeline. Every mutation is
//! queued on a [`SequentialTaskQueue`], so exactly one is in flight at a time
//! and no internal locking is needed beyond handing state to queued tasks.
//! The core holds its state in a mutex that is never held across an await;
//! collaborator calls run between lock scopes.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::backend::{CanvasBackend, CanvasError, StoreError, StrokeStore};
use crate::constants::{DEFAULT_SNAPSHOT_INTERVAL, INITIAL_MODE_INDEX};
use crate::history::{HistoryError, HistoryGraph};
use crate::modes::{ModeError, ModeTimeline};
use crate::queue::{Completion, SequentialTaskQueue};
use crate::snapshots::SnapshotIndex;
use crate::types::{CanvasInfo, DrawingMode, GotoPlan, StrokeKind};

/// Errors from timeline operations.
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Mode(#[from] ModeError),
    #[error("Canvas error: {0}")]
    Canvas(#[from] CanvasError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Jump payload must be an integer cursor, got {0}")]
    InvalidJumpPayload(Value),
    #[error("Timeline disposed before the task ran")]
    Disposed,
}

/// Tuning knobs for the timeline.
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Number of recorded non-jump strokes between automatic snapshots.
    pub snapshot_interval: u64,
    /// Drawing mode active from the first stroke.
    pub initial_mode: DrawingMode,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            initial_mode: DrawingMode::default(),
        }
    }
}

/// A queued mutation.
enum Request {
    Stroke {
        kind: StrokeKind,
        timestamp_ms: u64,
        payload: Value,
    },
    Jump {
        target: u64,
        timestamp_ms: u64,
    },
    Snapshot,
}

struct TimelineCore {
    stroke_count: u64,
    drawing_cursor: u64,
    since_snapshot: u64,
    snapshot_interval: u64,
    current_mode: DrawingMode,
    history: HistoryGraph,
    snapshots: SnapshotIndex,
    modes: ModeTimeline<DrawingMode>,
    canvas: Arc<dyn CanvasBackend>,
    store: Arc<dyn StrokeStore>,
}

type Shared = Arc<Mutex<TimelineCore>>;

impl TimelineCore {
    fn lock(core: &Shared) -> std::sync::MutexGuard<'_, TimelineCore> {
        core.lock().expect("timeline lock poisoned")
    }

    fn run(
        core: Shared,
        request: Request,
        done: oneshot::Sender<Result<u64, TimelineError>>,
    ) -> Completion<()> {
        let completion = match request {
            Request::Jump {
                target,
                timestamp_ms,
            } => Self::run_jump(core, target, timestamp_ms),
            Request::Stroke {
                kind,
                timestamp_ms,
                payload,
            } => Self::run_stroke(core, kind, timestamp_ms, payload),
            Request::Snapshot => Self::run_snapshot(core),
        };
        completion.map(move |result| {
            if let Err(err) = &result {
                warn!(%err, "timeline task failed");
            }
            let _ = done.send(result);
        })
    }

    /// Jump requests: resolve the destination, move the canvas without a
    /// forced repaint, then record the goto event. A collaborator failure
    /// records nothing.
    fn run_jump(core: Shared, target: u64, timestamp_ms: u64) -> Completion<Result<u64, TimelineError>> {
        let (resolved, canvas) = {
            let c = Self::lock(&core);
            let clamped = target.min(c.stroke_count);
            (c.history.dereference(clamped), Arc::clone(&c.canvas))
        };
        canvas
            .goto(resolved, false)
            .map(move |applied| match applied {
                Ok(()) => Self::lock(&core).record_goto(resolved, timestamp_ms),
                Err(err) => Err(err.into()),
            })
    }

    /// Stroke requests: resynchronize the cursor to the canvas if the user
    /// scrubbed history, apply the stroke, and record it only on success.
    fn run_stroke(
        core: Shared,
        kind: StrokeKind,
        timestamp_ms: u64,
        payload: Value,
    ) -> Completion<Result<u64, TimelineError>> {
        let (index, implicit_jump, canvas) = {
            let c = Self::lock(&core);
            let desired = c.canvas.target_cursor();
            // The user scrubbed history and now draws from there: plan an
            // implicit jump so the stroke forks from that cursor. Nothing is
            // recorded until the apply succeeds.
            let implicit_jump = (desired != c.drawing_cursor && desired != c.stroke_count)
                .then(|| {
                    let resolved = c.history.dereference(desired.min(c.stroke_count));
                    trace!(
                        desired,
                        resolved,
                        cursor = c.drawing_cursor,
                        "planning implicit resynchronizing jump"
                    );
                    resolved
                });
            let index = c.stroke_count + u64::from(implicit_jump.is_some());
            (index, implicit_jump, Arc::clone(&c.canvas))
        };
        canvas
            .apply(index, kind, &payload)
            .and_then(move |applied| match applied {
                Ok(()) => {
                    let (committed, snapshot_due) = {
                        let mut c = Self::lock(&core);
                        if let Some(resolved) = implicit_jump {
                            // No canvas call: the canvas is already there.
                            if let Err(err) = c.record_goto(resolved, timestamp_ms) {
                                return Completion::Ready(Err(err));
                            }
                        }
                        c.commit_stroke(kind, timestamp_ms, payload);
                        (index, c.since_snapshot >= c.snapshot_interval)
                    };
                    if snapshot_due {
                        Self::run_snapshot(core).map(move |taken| taken.map(|_| committed))
                    } else {
                        Completion::Ready(Ok(committed))
                    }
                }
                Err(err) => Completion::Ready(Err(err.into())),
            })
    }

    /// Capture canvas state, index it at the current cursor, and hand the
    /// blob to the store.
    fn run_snapshot(core: Shared) -> Completion<Result<u64, TimelineError>> {
        let canvas = Arc::clone(&Self::lock(&core).canvas);
        canvas.snapshot().map(move |captured| match captured {
            Ok(state) => {
                let mut c = Self::lock(&core);
                let index = c.drawing_cursor;
                c.snapshots.add_snapshot(index);
                c.store.add_snapshot(index, &state);
                c.since_snapshot = 0;
                debug!(index, bytes = state.len(), "captured snapshot");
                Ok(index)
            }
            Err(err) => Err(err.into()),
        })
    }

    /// Append a goto event at the current stroke count. The canvas has
    /// already moved (or never left) the destination.
    fn record_goto(&mut self, resolved: u64, timestamp_ms: u64) -> Result<u64, TimelineError> {
        let index = self.stroke_count;
        let destination = self.history.add_goto(index, resolved)?;
        self.store
            .add_stroke(index, StrokeKind::Goto, timestamp_ms, &Value::from(destination));
        self.stroke_count += 1;
        self.drawing_cursor = destination;
        debug!(index, destination, "recorded jump");
        Ok(index)
    }

    /// Append a non-jump stroke event. The canvas has already applied it.
    fn commit_stroke(&mut self, kind: StrokeKind, timestamp_ms: u64, payload: Value) {
        let index = self.stroke_count;
        if kind.uses_mode() && self.modes.latest_mode() != Some(&self.current_mode) {
            // The pending mode governs this stroke, so it is recorded against
            // the previous index. Before the first stroke that index is the
            // virtual initial slot, which is replaced rather than appended to.
            let recorded_at = index as i64 - 1;
            let recorded = if recorded_at == INITIAL_MODE_INDEX {
                self.modes.set_initial(self.current_mode.clone())
            } else {
                self.modes.add_mode(recorded_at, self.current_mode.clone())
            };
            if let Err(err) = recorded {
                warn!(%err, index, "mode record rejected");
            }
        }
        self.store.add_stroke(index, kind, timestamp_ms, &payload);
        self.stroke_count += 1;
        self.drawing_cursor = self.stroke_count;
        self.since_snapshot += 1;
        if kind.is_keyframe() {
            self.history.add_keyframe(index);
        }
        debug!(index, ?kind, "recorded stroke");
    }
}

/// Owner of the versioned stroke log.
///
/// All mutating calls return a [`Completion`]: `Ready` when the queue drained
/// without suspending, `Pending` otherwise. Reads between queue runs are safe
/// but may be stale while a task is in flight.
pub struct DrawingTimeline {
    core: Shared,
    queue: SequentialTaskQueue,
}

impl DrawingTimeline {
    /// Create a timeline with default configuration.
    pub fn new(canvas: Arc<dyn CanvasBackend>, store: Arc<dyn StrokeStore>) -> Self {
        Self::with_config(canvas, store, TimelineConfig::default())
    }

    /// Create a timeline with explicit configuration.
    pub fn with_config(
        canvas: Arc<dyn CanvasBackend>,
        store: Arc<dyn StrokeStore>,
        config: TimelineConfig,
    ) -> Self {
        let core = TimelineCore {
            stroke_count: 0,
            drawing_cursor: 0,
            since_snapshot: 0,
            snapshot_interval: config.snapshot_interval.max(1),
            current_mode: config.initial_mode.clone(),
            history: HistoryGraph::new(),
            snapshots: SnapshotIndex::new(),
            modes: ModeTimeline::with_initial(config.initial_mode),
            canvas,
            store,
        };
        Self {
            core: Arc::new(Mutex::new(core)),
            queue: SequentialTaskQueue::new(),
        }
    }

    /// Record a user action. Returns the queue's completion signal, resolving
    /// to the recorded log index.
    ///
    /// A `Goto` kind with an integer payload is routed as a jump request; use
    /// [`Self::jump`] for the same thing without the payload round-trip.
    pub fn add_stroke(
        &self,
        kind: StrokeKind,
        timestamp_ms: u64,
        payload: Value,
    ) -> Completion<Result<u64, TimelineError>> {
        if kind.is_goto() {
            let Some(target) = payload.as_u64() else {
                return Completion::Ready(Err(TimelineError::InvalidJumpPayload(payload)));
            };
            return self.enqueue(Request::Jump {
                target,
                timestamp_ms,
            });
        }
        self.enqueue(Request::Stroke {
            kind,
            timestamp_ms,
            payload,
        })
    }

    /// Record a jump to `target` (clamped and dereferenced while processing).
    /// Undo/redo destinations come from [`Self::compute_undo`] and
    /// [`Self::compute_redo`].
    pub fn jump(&self, target: u64, timestamp_ms: u64) -> Completion<Result<u64, TimelineError>> {
        self.enqueue(Request::Jump {
            target,
            timestamp_ms,
        })
    }

    /// Checkpoint the current canvas state. Resolves to the snapshot index.
    pub fn snapshot(&self) -> Completion<Result<u64, TimelineError>> {
        self.enqueue(Request::Snapshot)
    }

    /// Drain all queued mutations, then make the store durable. A storage
    /// failure leaves in-memory state valid; flushing again retries without
    /// replaying anything.
    pub fn flush(&self) -> Completion<Result<(), TimelineError>> {
        let core = Arc::clone(&self.core);
        self.queue.process_all().and_then(move |()| {
            let store = Arc::clone(&TimelineCore::lock(&core).store);
            store.flush().map(|flushed| flushed.map_err(TimelineError::from))
        })
    }

    /// Nearest earlier reachable cursor, or `None` at the start of history.
    pub fn compute_undo(&self) -> Option<u64> {
        let c = TimelineCore::lock(&self.core);
        c.history.compute_undo(c.drawing_cursor)
    }

    /// Nearest later reachable cursor, or `None` at the newest state.
    pub fn compute_redo(&self) -> Option<u64> {
        let c = TimelineCore::lock(&self.core);
        c.history.compute_redo(c.drawing_cursor, c.stroke_count)
    }

    /// Plan the replay needed to show cursor `end` starting from `start`.
    /// `end` is clamped to the log and dereferenced first.
    pub fn plan_goto(&self, start: u64, end: u64) -> GotoPlan {
        let c = TimelineCore::lock(&self.core);
        let end = c.history.dereference(end.min(c.stroke_count));
        c.history.plan_goto(start, end, &c.snapshots)
    }

    /// Number of recorded log events (strokes and jumps).
    pub fn stroke_count(&self) -> u64 {
        TimelineCore::lock(&self.core).stroke_count
    }

    /// Cursor the canvas currently shows.
    pub fn drawing_cursor(&self) -> u64 {
        TimelineCore::lock(&self.core).drawing_cursor
    }

    /// Stage a drawing mode. It is recorded on the mode timeline when the
    /// next mode-governed stroke commits.
    pub fn set_mode(&self, mode: DrawingMode) {
        TimelineCore::lock(&self.core).current_mode = mode;
    }

    /// Mode governing the stroke at `index`.
    pub fn mode_at(&self, index: u64) -> Result<DrawingMode, TimelineError> {
        let c = TimelineCore::lock(&self.core);
        Ok(c.modes.mode_at(index as i64)?.clone())
    }

    /// Indices with a recorded snapshot, ascending.
    pub fn snapshot_indices(&self) -> Vec<u64> {
        TimelineCore::lock(&self.core).snapshots.indices().to_vec()
    }

    /// Canvas facts, delegated to the collaborator.
    pub fn info(&self) -> CanvasInfo {
        TimelineCore::lock(&self.core).canvas.info()
    }

    /// Discard queued-but-unstarted work, e.g. when switching documents. The
    /// in-flight mutation, if any, still runs to completion.
    pub fn dispose(&self) {
        self.queue.dispose();
    }

    fn enqueue(&self, request: Request) -> Completion<Result<u64, TimelineError>> {
        let (done_tx, mut done_rx) = oneshot::channel();
        let core = Arc::clone(&self.core);
        self.queue
            .push(Box::new(move || TimelineCore::run(core, request, done_tx)));
        match self.queue.process_all() {
            Completion::Ready(()) => Completion::Ready(
                done_rx.try_recv().unwrap_or(Err(TimelineError::Disposed)),
            ),
            Completion::Pending(drain) => Completion::pending(async move {
                drain.await;
                done_rx.await.unwrap_or(Err(TimelineError::Disposed))
            }),
        }
    }
}

impl std::fmt::Debug for DrawingTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = TimelineCore::lock(&self.core);
        f.debug_struct("DrawingTimeline")
            .field("stroke_count", &c.stroke_count)
            .field("drawing_cursor", &c.drawing_cursor)
            .field("snapshots", &c.snapshots.len())
            .finish()
    }
}
