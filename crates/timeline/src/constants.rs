/// Strokes recorded between automatic snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 5000;

/// Virtual index carrying the initial drawing mode. A mode recorded at index
/// `i` governs strokes with index greater than `i`, so the initial mode sits
/// just before the first stroke.
pub const INITIAL_MODE_INDEX: i64 = -1;
