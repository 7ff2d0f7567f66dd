use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::info;

use crate::config::Config;
use crate::db::SnapshotStore;
use crate::error::Result;
use crate::fetcher::{fetch_markets, FetchStats};
use crate::ingest::{bucket_ts, build_ingest_batch};
use crate::movers::compute_moves;
use crate::types::WindowKey;

/// Row counts across every table once the run has finished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreTotals {
    pub markets: i64,
    pub snapshots: i64,
    pub moves: i64,
}

/// Per-phase row counts reported at the end of a successful run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub run_ts: i64,
    pub fetch: FetchStats,
    pub fetched: usize,
    pub markets_upserted: u64,
    pub snapshots_upserted: u64,
    pub unknown_probabilities: usize,
    pub skipped_no_id: usize,
    pub moves: Vec<(WindowKey, usize)>,
    pub totals: StoreTotals,
}

/// One full run: reference data, fetch, ingest, then every configured window.
///
/// The first error aborts the run. All writes are keyed upserts, so a failed
/// run can simply be retried from the top.
pub async fn run_once(cfg: &Config, store: &SnapshotStore) -> Result<RunSummary> {
    store
        .upsert_platform(&cfg.platform_id, &cfg.platform_name)
        .await?;

    let (records, fetch) = fetch_markets(cfg).await?;
    let now = now_ms();
    let mut summary =
        run_with_records(cfg, store, records, bucket_ts(now, cfg.snapshot_bucket_ms), now).await?;
    summary.fetch = fetch;
    Ok(summary)
}

/// Everything after the upstream fetch; `now_ms` anchors the lookback horizon.
pub async fn run_with_records(
    cfg: &Config,
    store: &SnapshotStore,
    records: Vec<Value>,
    run_ts: i64,
    now_ms: i64,
) -> Result<RunSummary> {
    let mut summary = RunSummary {
        run_ts,
        fetched: records.len(),
        ..RunSummary::default()
    };

    let batch = build_ingest_batch(&cfg.platform_id, records, run_ts);
    summary.unknown_probabilities = batch.unknown_probabilities;
    summary.skipped_no_id = batch.skipped_no_id;
    summary.markets_upserted = store.upsert_markets(&batch.markets).await?;
    summary.snapshots_upserted = store.upsert_snapshots(&batch.snapshots).await?;

    info!(
        run_ts,
        markets = summary.markets_upserted,
        snapshots = summary.snapshots_upserted,
        unknown = summary.unknown_probabilities,
        skipped_no_id = summary.skipped_no_id,
        "Ingested {} snapshots ({} without a probability)",
        summary.snapshots_upserted,
        summary.unknown_probabilities,
    );

    for &window in &cfg.windows {
        let outcome =
            compute_moves(store, &cfg.platform_id, window, cfg.lookback_ms, now_ms).await?;
        summary.moves.push((window, outcome.moves.len()));
    }

    summary.totals = StoreTotals {
        markets: store.count_markets().await?,
        snapshots: store.count_snapshots().await?,
        moves: store.count_moves().await?,
    };

    Ok(summary)
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
