//! Sorted index of stroke positions where full canvas state was checkpointed.

use crate::types::SkipInterval;

/// Sorted, deduplicated set of stroke indices with a stored snapshot.
///
/// Snapshots accumulate for the lifetime of a document; eviction is left to
/// the storage layer.
#[derive(Debug, Clone, Default)]
pub struct SnapshotIndex {
    indices: Vec<u64>,
}

impl SnapshotIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot at `index`. Idempotent; keeps the list sorted.
    pub fn add_snapshot(&mut self, index: u64) {
        if let Err(pos) = self.indices.binary_search(&index) {
            self.indices.insert(pos, index);
        }
    }

    /// Greatest snapshot index usable as a replay base for `target`.
    ///
    /// A snapshot at `s` is unusable when some skip interval starts before
    /// `s` and reaches it: the captured state would contain strokes that must
    /// not appear at `target`. Skip intervals entirely above `s` are handled
    /// by skipping during replay and do not disqualify it. Falls back to 0
    /// (empty canvas) when no recorded snapshot qualifies.
    pub fn nearest_snapshot_index(&self, target: u64, skips: &[SkipInterval]) -> u64 {
        let upper = self.indices.partition_point(|&s| s <= target);
        for &candidate in self.indices[..upper].iter().rev() {
            let invalidated = skips
                .iter()
                .any(|skip| skip.start < candidate && skip.end >= candidate);
            if !invalidated {
                return candidate;
            }
        }
        0
    }

    /// Whether a snapshot was recorded at `index`.
    pub fn contains(&self, index: u64) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// All recorded indices, ascending.
    pub fn indices(&self) -> &[u64] {
        &self.indices
    }

    /// Number of recorded snapshots.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skips(ranges: &[(u64, u64)]) -> Vec<SkipInterval> {
        ranges
            .iter()
            .map(|&(start, end)| SkipInterval::new(start, end))
            .collect()
    }

    #[test]
    fn test_insertion_stays_sorted_and_deduplicated() {
        let mut index = SnapshotIndex::new();
        index.add_snapshot(3);
        index.add_snapshot(1);
        assert_eq!(index.indices(), &[1, 3]);

        let mut index = SnapshotIndex::new();
        index.add_snapshot(3);
        index.add_snapshot(3);
        assert_eq!(index.indices(), &[3]);
    }

    #[test]
    fn test_nearest_without_skips() {
        let mut index = SnapshotIndex::new();
        index.add_snapshot(1);
        index.add_snapshot(3);
        let expected = [(0, 0), (1, 1), (2, 1), (3, 3), (4, 3)];
        for (target, want) in expected {
            assert_eq!(index.nearest_snapshot_index(target, &[]), want);
        }
    }

    #[test]
    fn test_skip_reaching_snapshot_disqualifies_it() {
        let mut index = SnapshotIndex::new();
        index.add_snapshot(1);
        index.add_snapshot(3);
        // [0, 1) reaches snapshot 1 but not snapshot 3.
        let skips = skips(&[(0, 1)]);
        let expected = [(0, 0), (1, 0), (2, 0), (3, 3), (4, 3)];
        for (target, want) in expected {
            assert_eq!(index.nearest_snapshot_index(target, &skips), want);
        }
    }

    #[test]
    fn test_skip_forces_earlier_snapshot() {
        let mut index = SnapshotIndex::new();
        index.add_snapshot(1);
        index.add_snapshot(3);
        // [2, 3) reaches snapshot 3; snapshot 1 stays usable.
        let skips = skips(&[(2, 3)]);
        let expected = [(0, 0), (1, 1), (2, 1), (3, 1), (4, 1)];
        for (target, want) in expected {
            assert_eq!(index.nearest_snapshot_index(target, &skips), want);
        }
    }

    #[test]
    fn test_nearest_is_pure() {
        let mut index = SnapshotIndex::new();
        index.add_snapshot(2);
        let skips = skips(&[(0, 2)]);
        let first = index.nearest_snapshot_index(4, &skips);
        let second = index.nearest_snapshot_index(4, &skips);
        assert_eq!(first, second);
    }
}
