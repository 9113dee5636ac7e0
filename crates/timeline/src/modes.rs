//! Append-only record of which drawing mode was active as of a stroke index.

use thiserror::Error;

use crate::constants::INITIAL_MODE_INDEX;

/// Errors from mode timeline bookkeeping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeError {
    #[error("Mode recorded out of order: index {index} <= last recorded {last}")]
    OrderingViolation { index: i64, last: i64 },
    #[error("No mode governs stroke index {0}")]
    LookupFailure(i64),
}

/// Append-only, binary-searchable record of mode changes.
///
/// A mode recorded at index `i` governs strokes with index greater than `i`,
/// i.e. it takes effect starting the next stroke. The initial mode lives at
/// virtual index -1 so it governs stroke 0 onward.
#[derive(Debug, Clone, Default)]
pub struct ModeTimeline<M> {
    /// Recorded (index, mode) pairs; indices strictly increase.
    entries: Vec<(i64, M)>,
}

impl<M: PartialEq> ModeTimeline<M> {
    /// Create an empty timeline. Lookups fail until a mode is recorded.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Create a timeline seeded with an initial mode at virtual index -1.
    pub fn with_initial(mode: M) -> Self {
        Self {
            entries: vec![(INITIAL_MODE_INDEX, mode)],
        }
    }

    /// Replace the initial mode at virtual index -1, seeding it if absent.
    ///
    /// Fails once any later entry exists: the initial mode then already
    /// governs recorded strokes and rewriting it would change history.
    pub fn set_initial(&mut self, mode: M) -> Result<(), ModeError> {
        match self.entries.last().map(|(index, _)| *index) {
            None => self.entries.push((INITIAL_MODE_INDEX, mode)),
            Some(INITIAL_MODE_INDEX) => self.entries[0].1 = mode,
            Some(last) => {
                return Err(ModeError::OrderingViolation {
                    index: INITIAL_MODE_INDEX,
                    last,
                });
            }
        }
        Ok(())
    }

    /// Record `mode` as active after stroke `index`.
    ///
    /// The index must come strictly after the last recorded entry; recording
    /// at a valid index a mode structurally identical to the latest one is a
    /// no-op.
    pub fn add_mode(&mut self, index: i64, mode: M) -> Result<(), ModeError> {
        if let Some((last, latest)) = self.entries.last() {
            if index <= *last {
                return Err(ModeError::OrderingViolation { index, last: *last });
            }
            if mode == *latest {
                return Ok(());
            }
        }
        self.entries.push((index, mode));
        Ok(())
    }

    /// Mode governing the stroke at `index`: the entry with the greatest
    /// recorded index strictly below `index`.
    pub fn mode_at(&self, index: i64) -> Result<&M, ModeError> {
        let n = self.entries.partition_point(|(i, _)| *i < index);
        if n == 0 {
            return Err(ModeError::LookupFailure(index));
        }
        Ok(&self.entries[n - 1].1)
    }

    /// Most recently recorded mode.
    pub fn latest_mode(&self) -> Option<&M> {
        self.entries.last().map(|(_, mode)| mode)
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> ModeTimeline<&'static str> {
        let mut modes = ModeTimeline::with_initial("a");
        modes.add_mode(5, "b").unwrap();
        modes.add_mode(10, "c").unwrap();
        modes
    }

    #[test]
    fn test_mode_at_uses_greatest_entry_below_index() {
        let modes = populated();
        for index in 0..=5 {
            assert_eq!(modes.mode_at(index), Ok(&"a"), "index {index}");
        }
        for index in 6..=10 {
            assert_eq!(modes.mode_at(index), Ok(&"b"), "index {index}");
        }
        for index in 11..=20 {
            assert_eq!(modes.mode_at(index), Ok(&"c"), "index {index}");
        }
    }

    #[test]
    fn test_add_mode_rejects_out_of_order_index() {
        let mut modes = populated();
        assert_eq!(
            modes.add_mode(10, "d"),
            Err(ModeError::OrderingViolation {
                index: 10,
                last: 10
            })
        );
        assert_eq!(
            modes.add_mode(3, "d"),
            Err(ModeError::OrderingViolation { index: 3, last: 10 })
        );
    }

    #[test]
    fn test_add_mode_identical_at_valid_index_is_noop() {
        let mut modes = populated();
        assert_eq!(modes.len(), 3);
        modes.add_mode(12, "c").unwrap();
        assert_eq!(modes.len(), 3);
        assert_eq!(modes.latest_mode(), Some(&"c"));
    }

    #[test]
    fn test_add_mode_stale_index_fails_even_when_identical() {
        let mut modes = populated();
        assert_eq!(
            modes.add_mode(4, "c"),
            Err(ModeError::OrderingViolation { index: 4, last: 10 })
        );
        assert_eq!(modes.len(), 3);
    }

    #[test]
    fn test_set_initial_replaces_seeded_mode() {
        let mut modes = ModeTimeline::with_initial("a");
        modes.set_initial("b").unwrap();
        assert_eq!(modes.mode_at(0), Ok(&"b"));
        assert_eq!(modes.len(), 1);

        // Seeds an empty timeline.
        let mut modes: ModeTimeline<&str> = ModeTimeline::new();
        modes.set_initial("a").unwrap();
        assert_eq!(modes.mode_at(0), Ok(&"a"));
    }

    #[test]
    fn test_set_initial_fails_once_later_entries_exist() {
        let mut modes = populated();
        assert_eq!(
            modes.set_initial("d"),
            Err(ModeError::OrderingViolation { index: -1, last: 10 })
        );
        assert_eq!(modes.mode_at(0), Ok(&"a"));
    }

    #[test]
    fn test_lookup_fails_on_empty_timeline() {
        let modes: ModeTimeline<&str> = ModeTimeline::new();
        assert_eq!(modes.mode_at(0), Err(ModeError::LookupFailure(0)));
        assert_eq!(modes.latest_mode(), None);
    }

    #[test]
    fn test_initial_mode_governs_from_stroke_zero() {
        let modes = ModeTimeline::with_initial("a");
        assert_eq!(modes.mode_at(0), Ok(&"a"));
        // Nothing governs the virtual index itself.
        assert_eq!(modes.mode_at(-1), Err(ModeError::LookupFailure(-1)));
    }
}
