//! Undo/redo history recorded as appended jumps.
//!
//! Undo never deletes log entries. Each undo or redo appends a goto record
//! that points the cursor at an earlier (or later) stroke index; replay then
//! excludes the superseded ranges via [`SkipInterval`]s. A cursor value `c`
//! denotes the canvas state produced by the visible portion of log positions
//! `[0, c)`.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::snapshots::SnapshotIndex;
use crate::types::{GotoPlan, SkipInterval};

/// Errors from history bookkeeping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Jump recorded out of order: at {at} <= last recorded {last}")]
    OrderingViolation { at: u64, last: u64 },
}

/// A recorded cursor jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GotoEntry {
    /// Log index the jump record itself occupies.
    pub recorded_at: u64,
    /// Destination cursor, stored dereferenced.
    pub target: u64,
}

/// History graph over the stroke log: recorded jumps plus keyframe marks.
///
/// Cursor transitions are *append* (cursor becomes the new stroke count after
/// a non-jump stroke) and *jump* (cursor becomes the dereferenced target of a
/// recorded goto). Nothing is ever removed.
#[derive(Debug, Clone, Default)]
pub struct HistoryGraph {
    /// Recorded jumps, ascending by `recorded_at`.
    gotos: Vec<GotoEntry>,
    /// Log indices that must stay individually replayable.
    keyframes: BTreeSet<u64>,
}

impl HistoryGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded jumps, ascending by position.
    pub fn gotos(&self) -> &[GotoEntry] {
        &self.gotos
    }

    /// Mark `index` as a keyframe: it is never folded into a skip interval.
    pub fn add_keyframe(&mut self, index: u64) {
        self.keyframes.insert(index);
    }

    /// Whether `index` is marked as a keyframe.
    pub fn is_keyframe(&self, index: u64) -> bool {
        self.keyframes.contains(&index)
    }

    /// Record a jump occupying log position `at` (the current stroke count)
    /// toward `target`. Returns the dereferenced destination cursor.
    pub fn add_goto(&mut self, at: u64, target: u64) -> Result<u64, HistoryError> {
        if let Some(last) = self.gotos.last() {
            if at <= last.recorded_at {
                return Err(HistoryError::OrderingViolation {
                    at,
                    last: last.recorded_at,
                });
            }
        }
        let resolved = self.dereference(target.min(at));
        self.gotos.push(GotoEntry {
            recorded_at: at,
            target: resolved,
        });
        Ok(resolved)
    }

    /// Goto entry recorded at exactly `index`, if any.
    fn goto_at(&self, index: u64) -> Option<&GotoEntry> {
        self.gotos
            .binary_search_by_key(&index, |entry| entry.recorded_at)
            .ok()
            .map(|pos| &self.gotos[pos])
    }

    /// Last recorded goto with `recorded_at` strictly below `bound`.
    fn goto_below(&self, bound: u64) -> Option<&GotoEntry> {
        let pos = self.gotos.partition_point(|entry| entry.recorded_at < bound);
        pos.checked_sub(1).map(|pos| &self.gotos[pos])
    }

    /// Resolve a cursor through recorded jump chains to a terminal,
    /// non-redirected stroke index.
    ///
    /// A cursor sitting just past a goto record denotes the same canvas state
    /// as the goto's destination, so each hop follows the record at
    /// `cursor - 1`. Targets never exceed their record's position, so the
    /// walk strictly descends.
    pub fn dereference(&self, cursor: u64) -> u64 {
        let mut current = cursor;
        while current > 0 {
            match self.goto_at(current - 1) {
                Some(entry) => current = entry.target,
                None => break,
            }
        }
        current
    }

    /// Cursor one user-visible undo step earlier, or `None` at the start of
    /// history.
    ///
    /// The stroke at `cursor - 1` is the newest visible one; the destination
    /// is the state that was current just before it was appended. Chains of
    /// consecutive jump records collapse into a single step through
    /// dereferencing.
    pub fn compute_undo(&self, cursor: u64) -> Option<u64> {
        if cursor == 0 {
            return None;
        }
        Some(self.dereference(cursor - 1))
    }

    /// Cursor one user-visible redo step later, or `None` at the newest
    /// state.
    ///
    /// Redo destinations come from inverting the trailing run of jump records
    /// at the end of the log. Appending a fresh stroke ends that run, which
    /// discards redoable states, matching linear undo semantics. A `cursor`
    /// that does not match the state the trailing run produced has nothing
    /// redoable.
    pub fn compute_redo(&self, cursor: u64, stroke_count: u64) -> Option<u64> {
        // Find the maximal suffix of consecutive goto records ending the log.
        let mut run_start = self.gotos.len();
        let mut expected = stroke_count;
        while run_start > 0 && self.gotos[run_start - 1].recorded_at + 1 == expected {
            expected = self.gotos[run_start - 1].recorded_at;
            run_start -= 1;
        }
        if run_start == self.gotos.len() {
            return None;
        }

        // Replay the run as an undo/redo session: jumping backward leaves a
        // redoable state behind; jumping forward onto the top of the stack
        // consumes it; any other forward jump abandons the stack.
        let mut state = self.dereference(self.gotos[run_start].recorded_at);
        let mut redoable: Vec<u64> = Vec::new();
        for entry in &self.gotos[run_start..] {
            let next = entry.target;
            if next < state {
                redoable.push(state);
            } else if next > state {
                if redoable.last() == Some(&next) {
                    redoable.pop();
                } else {
                    redoable.clear();
                }
            }
            state = next;
        }
        if state != cursor {
            return None;
        }
        redoable.last().copied()
    }

    /// Skip intervals covering everything in `[0, cursor)` that is not part
    /// of the visible state at `cursor`: superseded stroke ranges plus the
    /// goto records themselves. Keyframe indices are carved out so they stay
    /// individually replayable.
    pub fn skip_intervals(&self, cursor: u64) -> Vec<SkipInterval> {
        let mut skips = Vec::new();
        let mut upper = cursor;
        while let Some(entry) = self.goto_below(upper) {
            // Everything from the jump destination up to and including the
            // goto record itself is invisible at `cursor`; strokes between
            // the record and `upper` stay visible.
            skips.push(SkipInterval::new(entry.target, entry.recorded_at + 1));
            upper = entry.target;
        }
        skips.reverse();
        self.split_around_keyframes(skips)
    }

    /// Split skip intervals so that no keyframe index is covered.
    fn split_around_keyframes(&self, skips: Vec<SkipInterval>) -> Vec<SkipInterval> {
        if self.keyframes.is_empty() {
            return skips;
        }
        let mut out = Vec::with_capacity(skips.len());
        for skip in skips {
            let mut start = skip.start;
            for &keyframe in self.keyframes.range(skip.start..skip.end) {
                if keyframe > start {
                    out.push(SkipInterval::new(start, keyframe));
                }
                start = keyframe + 1;
            }
            if start < skip.end {
                out.push(SkipInterval::new(start, skip.end));
            }
        }
        out
    }

    /// Plan the replay needed to move the canvas from cursor `start` to
    /// cursor `end`.
    ///
    /// `end` must already be clamped to `[0, stroke_count]` and dereferenced.
    /// When the state at `start` is exactly a prefix of the state at `end`,
    /// the canvas can replay forward from where it is; otherwise the plan
    /// names a snapshot to revert to first.
    pub fn plan_goto(&self, start: u64, end: u64, snapshots: &SnapshotIndex) -> GotoPlan {
        if start == end {
            return GotoPlan::noop(end);
        }
        let skips = self.skip_intervals(end);
        let forward_ok =
            end > start && self.skip_intervals(start) == clip_below(&skips, start);
        if forward_ok {
            return GotoPlan {
                target: end,
                revert: None,
                replay_from: start,
                skips: clip_above(&skips, start),
            };
        }
        let base = snapshots.nearest_snapshot_index(end, &skips);
        GotoPlan {
            target: end,
            revert: Some(base),
            replay_from: base,
            skips: clip_above(&skips, base),
        }
    }
}

/// Portions of `skips` strictly below `bound`.
fn clip_below(skips: &[SkipInterval], bound: u64) -> Vec<SkipInterval> {
    skips
        .iter()
        .filter(|skip| skip.start < bound)
        .map(|skip| SkipInterval::new(skip.start, skip.end.min(bound)))
        .collect()
}

/// Portions of `skips` at or above `bound`.
fn clip_above(skips: &[SkipInterval], bound: u64) -> Vec<SkipInterval> {
    skips
        .iter()
        .filter(|skip| skip.end > bound)
        .map(|skip| SkipInterval::new(skip.start.max(bound), skip.end))
        .collect()
}
