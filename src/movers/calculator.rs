use std::collections::BTreeMap;

use tracing::info;

use crate::db::SnapshotStore;
use crate::error::Result;
use crate::movers::as_of::latest_at_or_before;
use crate::types::{Move, SnapshotPoint, WindowKey, PLACEHOLDER_TRUST_SCORE};

/// Aggregate result of one window pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WindowOutcome {
    pub moves: Vec<Move>,
    pub markets_seen: usize,
    /// Fewer than two numeric points in the lookback.
    pub skipped_insufficient: usize,
    /// No numeric point at or before `end_ts - window`.
    pub skipped_no_prior: usize,
}

/// Load recent snapshots, compute one window's moves and persist them.
///
/// Every call reads the store afresh, so windows never share state.
pub async fn compute_moves(
    store: &SnapshotStore,
    platform: &str,
    window: WindowKey,
    lookback_ms: i64,
    now_ms: i64,
) -> Result<WindowOutcome> {
    let groups = store.read_since(platform, None, now_ms - lookback_ms).await?;
    let outcome = moves_for_window(platform, &groups, window);
    let written = store.persist_moves(&outcome.moves).await?;

    info!(
        window = %window,
        markets = outcome.markets_seen,
        moves = written,
        skipped_insufficient = outcome.skipped_insufficient,
        skipped_no_prior = outcome.skipped_no_prior,
        "Window {window}: {written} moves from {} markets",
        outcome.markets_seen,
    );

    Ok(outcome)
}

/// Pure move computation over already-loaded, ascending per-market series.
///
/// "Now" is each market's freshest numeric point, not wall-clock time, so a
/// lagging ingestion shifts `end_ts` back instead of losing the move. Null
/// probabilities are dropped before the lookup.
pub fn moves_for_window(
    platform: &str,
    groups: &BTreeMap<String, Vec<SnapshotPoint>>,
    window: WindowKey,
) -> WindowOutcome {
    let mut outcome = WindowOutcome {
        markets_seen: groups.len(),
        ..WindowOutcome::default()
    };

    for (market_id, points) in groups {
        let series: Vec<(i64, f64)> = points
            .iter()
            .filter_map(|p| p.probability.map(|prob| (p.ts, prob)))
            .collect();
        let (now_ts, prob_now) = match series.as_slice() {
            [_, .., last] => *last,
            _ => {
                outcome.skipped_insufficient += 1;
                continue;
            }
        };

        let target = now_ts - window.duration_ms();
        let Some(&(_, prob_then)) = latest_at_or_before(&series, target) else {
            outcome.skipped_no_prior += 1;
            continue;
        };

        outcome.moves.push(Move {
            platform: platform.to_string(),
            market_id: market_id.clone(),
            window_key: window,
            end_ts: now_ts,
            prob_now,
            prob_then,
            delta: prob_now - prob_then,
            trust_score: PLACEHOLDER_TRUST_SCORE,
        });
    }

    outcome
}
