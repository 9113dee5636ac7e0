//! In-memory stroke store.
//!
//! Used in tests and as the default backend until a persistent store is
//! attached. Keeps the stroke and snapshot tables in `BTreeMap`s behind
//! `RwLock`s and emits [`StoreEvent`]s to registered listeners so external
//! systems (export, document sync) can react to rows without coupling to the
//! store itself.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::backend::{StoreError, StrokeStore};
use crate::queue::Completion;
use crate::types::{StrokeEvent, StrokeKind};

/// Events emitted as the store receives rows.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A stroke row was buffered.
    StrokeRecorded { index: u64, kind: StrokeKind },
    /// A snapshot blob was buffered.
    SnapshotRecorded { index: u64, bytes: usize },
    /// Buffered rows were made durable.
    Flushed { strokes: u64, snapshots: u64 },
}

/// Thread-safe in-memory store for stroke rows and snapshot blobs.
pub struct MemoryStore {
    /// Stroke table keyed by log index.
    strokes: RwLock<BTreeMap<u64, StrokeEvent>>,
    /// Snapshot table keyed by log index.
    snapshots: RwLock<BTreeMap<u64, Vec<u8>>>,
    /// Row counts as of the last successful flush.
    durable: RwLock<(u64, u64)>,
    /// Listeners receive cloned events.
    #[allow(clippy::type_complexity)]
    listeners: RwLock<Vec<Box<dyn Fn(StoreEvent) + Send + Sync>>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("strokes", &self.stroke_count())
            .field("snapshots", &self.snapshot_indices().len())
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            strokes: RwLock::new(BTreeMap::new()),
            snapshots: RwLock::new(BTreeMap::new()),
            durable: RwLock::new((0, 0)),
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for store events.
    pub fn add_event_listener<F>(&self, listener: F)
    where
        F: Fn(StoreEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().expect("MemoryStore lock poisoned");
        listeners.push(Box::new(listener));
    }

    /// Stroke row at `index`, if recorded.
    pub fn stroke(&self, index: u64) -> Option<StrokeEvent> {
        let strokes = self.strokes.read().expect("MemoryStore lock poisoned");
        strokes.get(&index).cloned()
    }

    /// Number of buffered stroke rows.
    pub fn stroke_count(&self) -> u64 {
        let strokes = self.strokes.read().expect("MemoryStore lock poisoned");
        strokes.len() as u64
    }

    /// Snapshot blob at `index`, if recorded.
    pub fn snapshot(&self, index: u64) -> Option<Vec<u8>> {
        let snapshots = self.snapshots.read().expect("MemoryStore lock poisoned");
        snapshots.get(&index).cloned()
    }

    /// All snapshot indices, ascending.
    pub fn snapshot_indices(&self) -> Vec<u64> {
        let snapshots = self.snapshots.read().expect("MemoryStore lock poisoned");
        snapshots.keys().copied().collect()
    }

    /// Row counts `(strokes, snapshots)` as of the last flush.
    pub fn durable_counts(&self) -> (u64, u64) {
        *self.durable.read().expect("MemoryStore lock poisoned")
    }

    fn emit(&self, event: StoreEvent) {
        let listeners = self.listeners.read().expect("MemoryStore lock poisoned");
        for listener in listeners.iter() {
            listener(event.clone());
        }
    }
}

impl StrokeStore for MemoryStore {
    fn add_stroke(&self, index: u64, kind: StrokeKind, timestamp_ms: u64, payload: &Value) {
        {
            let mut strokes = self.strokes.write().expect("MemoryStore lock poisoned");
            strokes.insert(
                index,
                StrokeEvent {
                    index,
                    kind,
                    timestamp_ms,
                    payload: payload.clone(),
                },
            );
        }
        self.emit(StoreEvent::StrokeRecorded { index, kind });
    }

    fn add_snapshot(&self, index: u64, state: &[u8]) {
        {
            let mut snapshots = self.snapshots.write().expect("MemoryStore lock poisoned");
            snapshots.insert(index, state.to_vec());
        }
        self.emit(StoreEvent::SnapshotRecorded {
            index,
            bytes: state.len(),
        });
    }

    fn flush(&self) -> Completion<Result<(), StoreError>> {
        let strokes = self.stroke_count();
        let snapshots = self.snapshot_indices().len() as u64;
        *self.durable.write().expect("MemoryStore lock poisoned") = (strokes, snapshots);
        self.emit(StoreEvent::Flushed { strokes, snapshots });
        Completion::Ready(Ok(()))
    }
}
