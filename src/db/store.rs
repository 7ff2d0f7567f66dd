use std::collections::BTreeMap;

use sqlx::{SqliteConnection, SqlitePool};

#[cfg(test)]
use crate::db::models::MoveRow;
use crate::db::models::SnapshotPointRow;
use crate::error::Result;
use crate::types::{MarketRow, Move, SnapshotPoint, SnapshotRow, WindowKey};

/// Keyed-upsert and ordered-range-read access to platforms, markets,
/// snapshots and moves.
///
/// Every write is an upsert on the table's natural key, so re-running a batch
/// with the same input leaves stored state unchanged. Batch writes run in one
/// transaction each: either the whole batch lands or none of it does.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn upsert_platform(&self, id: &str, name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO platforms (id, name) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_markets(&self, markets: &[MarketRow]) -> Result<u64> {
        if markets.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for m in markets {
            sqlx::query(
                r#"
                INSERT INTO markets (
                    platform, market_id, title, rules, close_time, status, raw_meta, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(platform, market_id) DO UPDATE SET
                    title = excluded.title,
                    rules = excluded.rules,
                    close_time = excluded.close_time,
                    status = excluded.status,
                    raw_meta = excluded.raw_meta,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&m.platform)
            .bind(&m.market_id)
            .bind(&m.title)
            .bind(&m.rules)
            .bind(&m.close_time)
            .bind(&m.status)
            .bind(&m.raw_meta)
            .bind(m.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(markets.len() as u64)
    }

    /// Upsert one snapshot on an open connection. An unknown probability is stored as NULL.
    pub async fn record_snapshot(conn: &mut SqliteConnection, s: &SnapshotRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (platform, market_id, ts, probability, raw_meta)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(platform, market_id, ts) DO UPDATE SET
                probability = excluded.probability,
                raw_meta = excluded.raw_meta
            "#,
        )
        .bind(&s.platform)
        .bind(&s.market_id)
        .bind(s.ts)
        .bind(s.probability)
        .bind(&s.raw_meta)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn upsert_snapshots(&self, snapshots: &[SnapshotRow]) -> Result<u64> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for s in snapshots {
            Self::record_snapshot(&mut *tx, s).await?;
        }
        tx.commit().await?;

        Ok(snapshots.len() as u64)
    }

    /// Snapshots with `ts >= since`, grouped by market id.
    ///
    /// Each market's points are ascending by timestamp; the as-of lookup
    /// depends on that ordering.
    pub async fn read_since(
        &self,
        platform: &str,
        market_id: Option<&str>,
        since: i64,
    ) -> Result<BTreeMap<String, Vec<SnapshotPoint>>> {
        let rows: Vec<SnapshotPointRow> = sqlx::query_as(
            r#"
            SELECT market_id, ts, probability
            FROM snapshots
            WHERE platform = ? AND ts >= ? AND (? IS NULL OR market_id = ?)
            ORDER BY market_id ASC, ts ASC
            "#,
        )
        .bind(platform)
        .bind(since)
        .bind(market_id)
        .bind(market_id)
        .fetch_all(&self.pool)
        .await?;

        let mut groups: BTreeMap<String, Vec<SnapshotPoint>> = BTreeMap::new();
        for row in rows {
            groups.entry(row.market_id).or_default().push(SnapshotPoint {
                ts: row.ts,
                probability: row.probability,
            });
        }
        Ok(groups)
    }

    /// Batch upsert keyed by (platform, market, window, end_ts); all value columns are overwritten.
    pub async fn persist_moves(&self, moves: &[Move]) -> Result<u64> {
        if moves.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for mv in moves {
            sqlx::query(
                r#"
                INSERT INTO moves (
                    platform, market_id, window_key, end_ts,
                    prob_now, prob_then, delta, trust_score
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(platform, market_id, window_key, end_ts) DO UPDATE SET
                    prob_now = excluded.prob_now,
                    prob_then = excluded.prob_then,
                    delta = excluded.delta,
                    trust_score = excluded.trust_score
                "#,
            )
            .bind(&mv.platform)
            .bind(&mv.market_id)
            .bind(mv.window_key.as_str())
            .bind(mv.end_ts)
            .bind(mv.prob_now)
            .bind(mv.prob_then)
            .bind(mv.delta)
            .bind(mv.trust_score)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(moves.len() as u64)
    }

    #[cfg(test)]
    pub async fn moves_for_window(&self, platform: &str, window: WindowKey) -> Result<Vec<MoveRow>> {
        let rows = sqlx::query_as(
            r#"
            SELECT platform, market_id, window_key, end_ts, prob_now, prob_then, delta, trust_score
            FROM moves
            WHERE platform = ? AND window_key = ?
            ORDER BY market_id ASC, end_ts ASC
            "#,
        )
        .bind(platform)
        .bind(window.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[cfg(test)]
    pub async fn delete_moves_for_window(&self, platform: &str, window: WindowKey) -> Result<u64> {
        let result = sqlx::query("DELETE FROM moves WHERE platform = ? AND window_key = ?")
            .bind(platform)
            .bind(window.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_markets(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM markets").await
    }

    pub async fn count_snapshots(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM snapshots").await
    }

    pub async fn count_moves(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM moves").await
    }

    async fn count(&self, sql: &'static str) -> Result<i64> {
        let n: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    fn snap(market_id: &str, ts: i64, probability: Option<f64>) -> SnapshotRow {
        SnapshotRow {
            platform: "polymarket".to_string(),
            market_id: market_id.to_string(),
            ts,
            probability,
            raw_meta: "{}".to_string(),
        }
    }

    fn market(market_id: &str, title: &str) -> MarketRow {
        MarketRow {
            platform: "polymarket".to_string(),
            market_id: market_id.to_string(),
            title: Some(title.to_string()),
            rules: None,
            close_time: None,
            status: "active".to_string(),
            raw_meta: "{}".to_string(),
            updated_at: 1_000,
        }
    }

    #[tokio::test]
    async fn read_since_groups_and_orders_ascending() {
        let store = SnapshotStore::new(connect_in_memory().await);
        store
            .upsert_snapshots(&[
                snap("b", 300, Some(0.3)),
                snap("a", 200, Some(0.2)),
                snap("a", 100, None),
                snap("b", 50, Some(0.1)),
                snap("a", 10, Some(0.9)),
            ])
            .await
            .unwrap();

        let groups = store.read_since("polymarket", None, 50).await.unwrap();
        assert_eq!(groups.len(), 2);
        let a: Vec<i64> = groups["a"].iter().map(|p| p.ts).collect();
        let b: Vec<i64> = groups["b"].iter().map(|p| p.ts).collect();
        assert_eq!(a, vec![100, 200]);
        assert_eq!(b, vec![50, 300]);
        assert_eq!(groups["a"][0].probability, None);

        let only_b = store.read_since("polymarket", Some("b"), 0).await.unwrap();
        assert_eq!(only_b.keys().collect::<Vec<_>>(), vec!["b"]);

        let other = store.read_since("kalshi", None, 0).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn snapshot_upsert_overwrites_same_key() {
        let store = SnapshotStore::new(connect_in_memory().await);
        let mut conn = store.pool().acquire().await.unwrap();
        SnapshotStore::record_snapshot(&mut *conn, &snap("a", 100, None))
            .await
            .unwrap();
        SnapshotStore::record_snapshot(&mut *conn, &snap("a", 100, Some(0.42)))
            .await
            .unwrap();
        drop(conn);

        assert_eq!(store.count_snapshots().await.unwrap(), 1);
        let groups = store.read_since("polymarket", Some("a"), 0).await.unwrap();
        assert_eq!(groups["a"], vec![SnapshotPoint { ts: 100, probability: Some(0.42) }]);
    }

    #[tokio::test]
    async fn market_upsert_refreshes_metadata() {
        let store = SnapshotStore::new(connect_in_memory().await);
        store.upsert_platform("polymarket", "Polymarket").await.unwrap();
        store.upsert_markets(&[market("a", "Old title")]).await.unwrap();
        store.upsert_markets(&[market("a", "New title")]).await.unwrap();

        assert_eq!(store.count_markets().await.unwrap(), 1);
        let title: Option<String> =
            sqlx::query_scalar("SELECT title FROM markets WHERE market_id = 'a'")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(title.as_deref(), Some("New title"));
    }

    #[tokio::test]
    async fn persist_moves_overwrites_on_key() {
        let store = SnapshotStore::new(connect_in_memory().await);
        let mut mv = Move {
            platform: "polymarket".to_string(),
            market_id: "a".to_string(),
            window_key: WindowKey::OneHour,
            end_ts: 5_000,
            prob_now: 0.7,
            prob_then: 0.55,
            delta: 0.7 - 0.55,
            trust_score: 0.5,
        };
        store.persist_moves(&[mv.clone()]).await.unwrap();
        mv.prob_then = 0.6;
        mv.delta = 0.7 - 0.6;
        store.persist_moves(&[mv.clone()]).await.unwrap();

        assert_eq!(store.count_moves().await.unwrap(), 1);
        let rows = store.moves_for_window("polymarket", WindowKey::OneHour).await.unwrap();
        assert_eq!(rows[0].prob_then, 0.6);
        assert_eq!(rows[0].delta, 0.7 - 0.6);
        assert_eq!(rows[0].window_key, "1h");
    }

    #[tokio::test]
    async fn empty_batches_are_noops() {
        let store = SnapshotStore::new(connect_in_memory().await);
        assert_eq!(store.upsert_markets(&[]).await.unwrap(), 0);
        assert_eq!(store.upsert_snapshots(&[]).await.unwrap(), 0);
        assert_eq!(store.persist_moves(&[]).await.unwrap(), 0);
    }
}
