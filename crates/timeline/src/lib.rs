//! Sinopia drawing timeline - versioned stroke log with non-linear undo/redo
//!
//! This crate records a user's drawing actions as an append-only event log
//! and reconstructs the canvas at any point in that history:
//! - [`timeline::DrawingTimeline`] - Orchestrator serializing all mutation
//! - [`history::HistoryGraph`] - Undo/redo recorded as appended jumps
//! - [`snapshots::SnapshotIndex`] - Checkpoints for fast state replay
//! - [`modes::ModeTimeline`] - Which drawing settings were active when
//! - [`queue::SequentialTaskQueue`] - One in-flight mutation at a time
//! - [`backend`] - Canvas and storage collaborator traits
//! - [`store::MemoryStore`] - In-memory store with event hooks
//!
//! Undo and redo never delete log entries: they append goto records, and
//! replay excludes the superseded ranges via skip intervals.

pub mod backend;
pub mod constants;
pub mod history;
pub mod modes;
pub mod queue;
pub mod snapshots;
pub mod store;
pub mod timeline;
pub mod types;

pub use backend::*;
pub use constants::*;
pub use history::*;
pub use modes::*;
pub use queue::*;
pub use snapshots::*;
pub use store::*;
pub use timeline::*;
pub use types::*;
