use std::str::FromStr;

// ---------------------------------------------------------------------------
// Window keys
// ---------------------------------------------------------------------------

pub const MINUTE_MS: i64 = 60 * 1_000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;

/// Named fixed duration over which a move is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WindowKey {
    OneMinute,
    FiveMinutes,
    OneHour,
    SixHours,
    OneDay,
}

impl WindowKey {
    pub const ALL: [WindowKey; 5] = [
        WindowKey::OneMinute,
        WindowKey::FiveMinutes,
        WindowKey::OneHour,
        WindowKey::SixHours,
        WindowKey::OneDay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WindowKey::OneMinute => "1m",
            WindowKey::FiveMinutes => "5m",
            WindowKey::OneHour => "1h",
            WindowKey::SixHours => "6h",
            WindowKey::OneDay => "24h",
        }
    }

    pub fn duration_ms(self) -> i64 {
        match self {
            WindowKey::OneMinute => MINUTE_MS,
            WindowKey::FiveMinutes => 5 * MINUTE_MS,
            WindowKey::OneHour => HOUR_MS,
            WindowKey::SixHours => 6 * HOUR_MS,
            WindowKey::OneDay => 24 * HOUR_MS,
        }
    }
}

impl std::fmt::Display for WindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WindowKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        WindowKey::ALL
            .into_iter()
            .find(|w| w.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown window key '{s}' (expected one of 1m, 5m, 1h, 6h, 24h)"))
    }
}

// ---------------------------------------------------------------------------
// Probability
// ---------------------------------------------------------------------------

/// Outcome of normalizing one upstream record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Probability {
    /// Probability of yes in [0, 1] and the extractor that produced it.
    Known { value: f64, source: &'static str },
    Unknown,
}

impl Probability {
    pub fn value(&self) -> Option<f64> {
        match self {
            Probability::Known { value, .. } => Some(*value),
            Probability::Unknown => None,
        }
    }

    pub fn source(&self) -> Option<&'static str> {
        match self {
            Probability::Known { source, .. } => Some(*source),
            Probability::Unknown => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MarketRow {
    pub platform: String,
    pub market_id: String,
    pub title: Option<String>,
    pub rules: Option<String>,
    pub close_time: Option<String>,
    pub status: String,
    /// Full upstream record, serialized JSON.
    pub raw_meta: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub platform: String,
    pub market_id: String,
    pub ts: i64,
    /// `None` when the normalizer could not produce a probability.
    pub probability: Option<f64>,
    pub raw_meta: String,
}

/// One point of a market's time series as read back from the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotPoint {
    pub ts: i64,
    pub probability: Option<f64>,
}

/// Placeholder until a real confidence model exists.
pub const PLACEHOLDER_TRUST_SCORE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Move {
    pub platform: String,
    pub market_id: String,
    pub window_key: WindowKey,
    pub end_ts: i64,
    pub prob_now: f64,
    pub prob_then: f64,
    pub delta: f64,
    pub trust_score: f64,
}
