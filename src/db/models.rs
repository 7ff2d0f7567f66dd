//! Row types read back through sqlx for the store and the read API.

#[derive(Debug, sqlx::FromRow)]
pub struct SnapshotPointRow {
    pub market_id: String,
    pub ts: i64,
    pub probability: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct StoredSnapshotRow {
    pub market_id: String,
    pub ts: i64,
    pub probability: Option<f64>,
    pub raw_meta: String,
}

/// Full move row; only tests read moves back without the market title.
#[cfg(test)]
#[derive(Debug, sqlx::FromRow)]
pub struct MoveRow {
    pub platform: String,
    pub market_id: String,
    pub window_key: String,
    pub end_ts: i64,
    pub prob_now: f64,
    pub prob_then: f64,
    pub delta: f64,
    pub trust_score: f64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct MoveWithTitleRow {
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
