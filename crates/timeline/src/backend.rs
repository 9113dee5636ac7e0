//! Interfaces to the canvas renderer and the stroke store.
//!
//! The timeline core performs no rendering or I/O itself; both concerns live
//! behind these traits. Calls that may need GPU or disk work return a
//! [`Completion`] so synchronous implementations stay synchronous.

use serde_json::Value;
use thiserror::Error;

use crate::queue::Completion;
use crate::types::{CanvasInfo, StrokeKind};

/// Errors surfaced by the canvas collaborator.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("Canvas rejected stroke {index}: {reason}")]
    Rejected { index: u64, reason: String },
    #[error("Canvas backend failure: {0}")]
    Backend(String),
}

/// Errors surfaced by the stroke store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to serialize stroke {index}: {source}")]
    Serialize {
        index: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Rendering collaborator that owns the pixel state.
pub trait CanvasBackend: Send + Sync {
    /// Apply a recorded stroke to the canvas. Implementations that suspend
    /// must capture what they need; the payload reference does not outlive
    /// the call.
    fn apply(
        &self,
        index: u64,
        kind: StrokeKind,
        payload: &Value,
    ) -> Completion<Result<(), CanvasError>>;

    /// Move the visible state to `target`, optionally repainting immediately.
    fn goto(&self, target: u64, repaint: bool) -> Completion<Result<(), CanvasError>>;

    /// Capture the full canvas state as an opaque blob.
    fn snapshot(&self) -> Completion<Result<Vec<u8>, CanvasError>>;

    /// Cursor the canvas wants to display, e.g. while the user scrubs
    /// history. The timeline resynchronizes to it before drawing.
    fn target_cursor(&self) -> u64;

    /// Static facts about the surface.
    fn info(&self) -> CanvasInfo;
}

/// Persistence collaborator for the stroke and snapshot tables.
///
/// `add_stroke` and `add_snapshot` buffer rows; `flush` is the durability
/// phase. A failed flush leaves the buffered rows intact so it can simply be
/// retried.
pub trait StrokeStore: Send + Sync {
    /// Buffer a stroke row keyed by index.
    fn add_stroke(&self, index: u64, kind: StrokeKind, timestamp_ms: u64, payload: &Value);

    /// Buffer a snapshot blob keyed by index.
    fn add_snapshot(&self, index: u64, state: &[u8]);

    /// Make everything buffered durable.
    fn flush(&self) -> Completion<Result<(), StoreError>>;
}
