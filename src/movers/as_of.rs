use crate::types::SnapshotPoint;

/// Anything carrying a millisecond timestamp.
pub trait Timestamped {
    fn ts(&self) -> i64;
}

impl Timestamped for SnapshotPoint {
    fn ts(&self) -> i64 {
        self.ts
    }
}

/// `(ts, probability)` pairs of an already-filtered numeric series.
impl Timestamped for (i64, f64) {
    fn ts(&self) -> i64 {
        self.0
    }
}

/// Latest point whose timestamp is `<= target_ms`.
///
/// `points` must be ascending by `ts`. Returns `None` when the series is empty
/// or starts after the target. This is the latest point not after the target,
/// not the nearest one in absolute time.
pub fn latest_at_or_before<P: Timestamped>(points: &[P], target_ms: i64) -> Option<&P> {
    let after = points.partition_point(|p| p.ts() <= target_ms);
    after.checked_sub(1).map(|idx| &points[idx])
}
