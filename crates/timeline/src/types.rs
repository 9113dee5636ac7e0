use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kinds of recorded stroke events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeKind {
    /// Freehand brush stroke.
    Draw,
    /// Flood fill.
    Fill,
    /// Cursor jump recorded for undo/redo.
    Goto,
    /// Layer added. Structural: stays individually replayable.
    AddLayer,
    /// Layer removed. Structural: stays individually replayable.
    RemoveLayer,
}

impl StrokeKind {
    /// True for jump records.
    pub fn is_goto(&self) -> bool {
        matches!(self, StrokeKind::Goto)
    }

    /// Structural events are keyframes: replay must apply them even when the
    /// surrounding range was undone, so they are never folded into a skip
    /// interval.
    pub fn is_keyframe(&self) -> bool {
        matches!(self, StrokeKind::AddLayer | StrokeKind::RemoveLayer)
    }

    /// True for kinds governed by the active drawing mode.
    pub fn uses_mode(&self) -> bool {
        matches!(self, StrokeKind::Draw | StrokeKind::Fill)
    }
}

/// One recorded user action in the append-only stroke log.
///
/// Events are immutable once recorded. The index is the position in the log;
/// indices strictly increase with no gaps, and jump records occupy positions
/// like any other event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrokeEvent {
    /// Position in the log.
    pub index: u64,
    /// What kind of action was recorded.
    pub kind: StrokeKind,
    /// Timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Kind-specific payload. For jumps this is the target cursor.
    pub payload: Value,
}

/// Half-open range `[start, end)` of log indices excluded from replay
/// because an undo along the current path superseded them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipInterval {
    /// First skipped index.
    pub start: u64,
    /// One past the last skipped index.
    pub end: u64,
}

impl SkipInterval {
    /// Create a new skip interval.
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Whether `index` falls inside the interval.
    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && index < self.end
    }

    /// True when the interval covers nothing.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Replay plan for moving the canvas to a target cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GotoPlan {
    /// Dereferenced destination cursor.
    pub target: u64,
    /// Snapshot index to restore before replaying. `None` when the current
    /// canvas state can simply be extended forward.
    pub revert: Option<u64>,
    /// First log index to replay: the snapshot base when reverting, otherwise
    /// the cursor the canvas already shows.
    pub replay_from: u64,
    /// Ranges within the replayed span that must not be re-applied.
    pub skips: Vec<SkipInterval>,
}

impl GotoPlan {
    /// A plan that requires no work: the canvas is already at `target`.
    pub fn noop(target: u64) -> Self {
        Self {
            target,
            revert: None,
            replay_from: target,
            skips: Vec::new(),
        }
    }

    /// True when the plan requires no replay at all.
    pub fn is_noop(&self) -> bool {
        self.revert.is_none() && self.replay_from == self.target
    }
}

/// Blend modes for drawing strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum BlendMode {
    #[default]
    Normal = 0,
    Erase = 1,
    // Add more as needed
}

/// Active drawing settings, recorded on the mode timeline so replay knows
/// what was in effect at any past stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingMode {
    /// Brush preset id.
    pub tool_id: u32,
    /// Blend mode.
    pub blend_mode: BlendMode,
    /// Color as [r, g, b, a].
    pub color: [f32; 4],
    /// Brush diameter in pixels.
    pub size: f32,
    /// Stroke opacity in [0, 1].
    pub opacity: f32,
}

impl Default for DrawingMode {
    fn default() -> Self {
        Self {
            tool_id: 0,
            blend_mode: BlendMode::Normal,
            color: [0.0, 0.0, 0.0, 1.0],
            size: 8.0,
            opacity: 1.0,
        }
    }
}

/// Static facts about the canvas surface, reported by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasInfo {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Number of layers.
    pub layer_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_interval_contains() {
        let skip = SkipInterval::new(2, 5);
        assert!(!skip.contains(1));
        assert!(skip.contains(2));
        assert!(skip.contains(4));
        assert!(!skip.contains(5));
    }

    #[test]
    fn test_keyframe_kinds() {
        assert!(StrokeKind::AddLayer.is_keyframe());
        assert!(StrokeKind::RemoveLayer.is_keyframe());
        assert!(!StrokeKind::Draw.is_keyframe());
        assert!(!StrokeKind::Goto.is_keyframe());
        assert!(StrokeKind::Goto.is_goto());
    }
}
