use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{MoveWithTitleRow, StoredSnapshotRow};
use crate::error::AppError;
use crate::types::WindowKey;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub platform: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/moves", get(get_moves))
        .route("/markets/:market_id/snapshots", get(get_market_snapshots))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct MovesQuery {
    pub window: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct SnapshotsQuery {
    pub since: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MoveResponse {
    pub platform: String,
    pub market_id: String,
    pub title: Option<String>,
    pub window_key: String,
    pub end_ts: i64,
    pub prob_now: f64,
    pub prob_then: f64,
    pub delta: f64,
    pub trust_score: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SnapshotResponse {
    pub market_id: String,
    pub ts: i64,
    pub probability: Option<f64>,
    pub raw_meta: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Moves for one window, largest absolute change first.
async fn get_moves(
    State(state): State<ApiState>,
    Query(params): Query<MovesQuery>,
) -> Result<Json<Vec<MoveResponse>>, AppError> {
    let window = params
        .window
        .as_deref()
        .unwrap_or("1h")
        .parse::<WindowKey>()
        .map_err(AppError::BadRequest)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);
    let since = params.since.unwrap_or(i64::MIN);
    let until = params.until.unwrap_or(i64::MAX);

    let rows: Vec<MoveWithTitleRow> = sqlx::query_as(
        r#"
        SELECT mv.platform, mv.market_id, m.title, mv.window_key, mv.end_ts,
               mv.prob_now, mv.prob_then, mv.delta, mv.trust_score
        FROM moves mv
        LEFT JOIN markets m ON m.platform = mv.platform AND m.market_id = mv.market_id
        WHERE mv.platform = ? AND mv.window_key = ? AND mv.end_ts >= ? AND mv.end_ts <= ?
        ORDER BY ABS(mv.delta) DESC, mv.market_id ASC, mv.end_ts DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(&state.platform)
    .bind(window.as_str())
    .bind(since)
    .bind(until)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let moves = rows
        .into_iter()
        .map(|r| MoveResponse {
            platform: r.platform,
            market_id: r.market_id,
            title: r.title,
            window_key: r.window_key,
            end_ts: r.end_ts,
            prob_now: r.prob_now,
            prob_then: r.prob_then,
            delta: r.delta,
            trust_score: r.trust_score,
        })
        .collect();

    Ok(Json(moves))
}

async fn get_market_snapshots(
    State(state): State<ApiState>,
    Path(market_id): Path<String>,
    Query(params): Query<SnapshotsQuery>,
) -> Result<Json<Vec<SnapshotResponse>>, AppError> {
    let since = params.since.unwrap_or(0);

    let rows: Vec<StoredSnapshotRow> = sqlx::query_as(
        r#"
        SELECT market_id, ts, probability, raw_meta
        FROM snapshots
        WHERE platform = ? AND market_id = ? AND ts >= ?
        ORDER BY ts ASC
        "#,
    )
    .bind(&state.platform)
    .bind(&market_id)
    .bind(since)
    .fetch_all(&state.pool)
    .await?;

    let snapshots = rows
        .into_iter()
        .map(|r| SnapshotResponse {
            market_id: r.market_id,
            ts: r.ts,
            probability: r.probability,
            raw_meta: serde_json::from_str(&r.raw_meta).unwrap_or(serde_json::Value::Null),
        })
        .collect();

    Ok(Json(snapshots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, SnapshotStore};
    use crate::types::{MarketRow, Move, SnapshotRow};

    fn mv(market_id: &str, window: WindowKey, end_ts: i64, now: f64, then: f64) -> Move {
        Move {
            platform: "polymarket".to_string(),
            market_id: market_id.to_string(),
            window_key: window,
            end_ts,
            prob_now: now,
            prob_then: then,
            delta: now - then,
            trust_score: 0.5,
        }
    }

    async fn serve() -> String {
        let pool = connect_in_memory().await;
        let store = SnapshotStore::new(pool.clone());
        store
            .upsert_markets(&[MarketRow {
                platform: "polymarket".to_string(),
                market_id: "big".to_string(),
                title: Some("Big mover".to_string()),
                rules: None,
                close_time: None,
                status: "active".to_string(),
                raw_meta: "{}".to_string(),
                updated_at: 0,
            }])
            .await
            .unwrap();
        store
            .persist_moves(&[
                mv("small", WindowKey::OneHour, 100, 0.50, 0.48),
                mv("big", WindowKey::OneHour, 100, 0.20, 0.60),
                mv("mid", WindowKey::OneHour, 200, 0.70, 0.60),
                mv("big", WindowKey::FiveMinutes, 100, 0.20, 0.21),
            ])
            .await
            .unwrap();
        store
            .upsert_snapshots(&[
                SnapshotRow {
                    platform: "polymarket".to_string(),
                    market_id: "big".to_string(),
                    ts: 20,
                    probability: Some(0.2),
                    raw_meta: r#"{"source":"direct"}"#.to_string(),
                },
                SnapshotRow {
                    platform: "polymarket".to_string(),
                    market_id: "big".to_string(),
                    ts: 10,
                    probability: None,
                    raw_meta: "{}".to_string(),
                },
            ])
            .await
            .unwrap();

        let app = router(ApiState { pool, platform: "polymarket".to_string() });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn moves_are_ranked_by_absolute_delta() {
        let base = serve().await;
        let moves: Vec<MoveResponse> = reqwest::get(format!("{base}/moves?window=1h"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let ids: Vec<&str> = moves.iter().map(|m| m.market_id.as_str()).collect();
        assert_eq!(ids, vec!["big", "mid", "small"]);
        assert_eq!(moves[0].title.as_deref(), Some("Big mover"));
        assert!(moves[0].delta < 0.0);
        assert_eq!(moves[1].title, None);
    }

    #[tokio::test]
    async fn moves_honor_range_and_paging() {
        let base = serve().await;
        let moves: Vec<MoveResponse> =
            reqwest::get(format!("{base}/moves?window=1h&since=150"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].market_id, "mid");

        let moves: Vec<MoveResponse> =
            reqwest::get(format!("{base}/moves?window=1h&limit=1&offset=2"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].market_id, "small");
    }

    #[tokio::test]
    async fn unknown_window_is_bad_request() {
        let base = serve().await;
        let resp = reqwest::get(format!("{base}/moves?window=3d")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn snapshots_come_back_ascending() {
        let base = serve().await;
        let snaps: Vec<SnapshotResponse> = reqwest::get(format!("{base}/markets/big/snapshots"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let ts: Vec<i64> = snaps.iter().map(|s| s.ts).collect();
        assert_eq!(ts, vec![10, 20]);
        assert_eq!(snaps[0].probability, None);
        assert_eq!(snaps[1].raw_meta["source"], "direct");
    }

    #[tokio::test]
    async fn health_is_ok() {
        let base = serve().await;
        let body: serde_json::Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }
}
