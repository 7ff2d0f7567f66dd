use crate::types::Probability;
use crate::upstream::UpstreamMarket;

/// Direct probability fields, tried in order.
pub const DIRECT_FIELDS: &[&str] = &[
    "probability",
    "prob",
    "yesProbability",
    "yes_probability",
    "yesPrice",
    "yes_price",
];

type Extractor = fn(&UpstreamMarket) -> Option<f64>;

/// Ordered fallback chain. The first extractor returning a value wins.
const EXTRACTORS: &[(&str, Extractor)] = &[
    ("direct", direct_field),
    ("outcome_index", yes_outcome_price),
    ("first_price", first_price),
];

/// Convert one upstream record into a probability of yes, or `Unknown`.
pub fn normalize(market: &UpstreamMarket) -> Probability {
    let Some((source, raw)) = EXTRACTORS
        .iter()
        .find_map(|(name, extract)| extract(market).map(|v| (*name, v)))
    else {
        return Probability::Unknown;
    };

    match scale(raw) {
        Some(value) => Probability::Known { value, source },
        None => Probability::Unknown,
    }
}

/// Values above 1 are percentages. Anything still outside [0, 1] is rejected.
pub fn scale(raw: f64) -> Option<f64> {
    if !raw.is_finite() {
        return None;
    }
    let v = if raw > 1.0 { raw / 100.0 } else { raw };
    (0.0..=1.0).contains(&v).then_some(v)
}

fn direct_field(market: &UpstreamMarket) -> Option<f64> {
    DIRECT_FIELDS.iter().find_map(|name| market.number(name))
}

/// Index of the "yes" outcome, only when outcomes and prices line up one to one.
fn matched_yes_index(market: &UpstreamMarket, prices: &[Option<f64>]) -> Option<usize> {
    let outcomes = market.outcomes()?;
    if outcomes.len() != prices.len() {
        return None;
    }
    outcomes
        .iter()
        .position(|o| o.trim().eq_ignore_ascii_case("yes"))
}

fn yes_outcome_price(market: &UpstreamMarket) -> Option<f64> {
    let prices = market.outcome_prices()?;
    let idx = matched_yes_index(market, &prices)?;
    prices.get(idx).copied().flatten()
}

/// Only meaningful for binary markets listed yes-first.
fn first_price(market: &UpstreamMarket) -> Option<f64> {
    let prices = market.outcome_prices()?;
    if prices.is_empty() || matched_yes_index(market, &prices).is_some() {
        return None;
    }
    prices.first().copied().flatten()
}
