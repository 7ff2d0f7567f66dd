use serde_json::{json, Value};

use crate::normalizer::normalize;
use crate::types::{MarketRow, SnapshotRow};
use crate::upstream::UpstreamMarket;

/// Everything one ingestion pass will write, built before any write happens.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestBatch {
    pub markets: Vec<MarketRow>,
    pub snapshots: Vec<SnapshotRow>,
    /// Snapshots stored with a NULL probability.
    pub unknown_probabilities: usize,
    /// Records dropped because no identifier field was usable.
    pub skipped_no_id: usize,
}

/// Turn fetched upstream records into market and snapshot rows stamped with `ts`.
pub fn build_ingest_batch(platform: &str, records: Vec<Value>, ts: i64) -> IngestBatch {
    let mut batch = IngestBatch::default();

    for raw in records {
        let market = UpstreamMarket::new(raw);
        let Some(market_id) = market.market_id() else {
            batch.skipped_no_id += 1;
            continue;
        };

        let probability = normalize(&market);
        if probability.value().is_none() {
            batch.unknown_probabilities += 1;
        }

        let snapshot_meta = json!({
            "source": probability.source(),
            "outcomes": market.field("outcomes"),
            "outcomePrices": market
                .field("outcomePrices")
                .or_else(|| market.field("outcome_prices")),
        });

        batch.snapshots.push(SnapshotRow {
            platform: platform.to_string(),
            market_id: market_id.clone(),
            ts,
            probability: probability.value(),
            raw_meta: snapshot_meta.to_string(),
        });

        batch.markets.push(MarketRow {
            platform: platform.to_string(),
            market_id,
            title: market.title(),
            rules: market.rules(),
            close_time: market.close_time(),
            status: market.status(),
            raw_meta: market.raw().to_string(),
            updated_at: ts,
        });
    }

    batch
}

/// Floor a millisecond timestamp to the start of its bucket.
pub fn bucket_ts(now_ms: i64, bucket_ms: i64) -> i64 {
    if bucket_ms <= 0 {
        return now_ms;
    }
    now_ms - now_ms.rem_euclid(bucket_ms)
}
