//! Typed view over one upstream market record.
//!
//! Upstream schemas have drifted over time: numbers arrive as JSON numbers or
//! strings, and list fields arrive either as JSON arrays or as strings holding
//! an encoded array. Every accessor here returns `None` for absent or
//! unusable fields instead of failing.

use serde::Deserialize;
use serde_json::Value;

/// Fields tried in order when deriving the market identifier.
pub const ID_FIELDS: &[&str] = &["id", "conditionId", "condition_id", "slug", "ticker"];
const TITLE_FIELDS: &[&str] = &["question", "title"];
const RULES_FIELDS: &[&str] = &["description", "rules", "rulesPrimary"];
const CLOSE_TIME_FIELDS: &[&str] = &["endDate", "endDateIso", "closeTime", "close_time"];

/// A numeric field as upstream sends it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Numberish {
    Number(f64),
    Text(String),
}

impl Numberish {
    /// Finite value, or `None` if the text does not parse.
    pub fn to_f64(&self) -> Option<f64> {
        let v = match self {
            Numberish::Number(n) => *n,
            Numberish::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

/// A list field: either a real JSON array or a string holding one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Listish {
    List(Vec<Value>),
    Encoded(String),
}

impl Listish {
    pub fn into_values(self) -> Option<Vec<Value>> {
        match self {
            Listish::List(items) => Some(items),
            Listish::Encoded(s) => serde_json::from_str::<Vec<Value>>(&s).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamMarket {
    raw: Value,
}

impl UpstreamMarket {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.raw.get(name).filter(|v| !v.is_null())
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        let v = self.field(name)?;
        Numberish::deserialize(v).ok()?.to_f64()
    }

    pub fn list(&self, name: &str) -> Option<Vec<Value>> {
        let v = self.field(name)?;
        Listish::deserialize(v).ok()?.into_values()
    }

    /// Outcome labels; non-string entries are rendered as their JSON text.
    pub fn outcomes(&self) -> Option<Vec<String>> {
        let items = self.list("outcomes")?;
        Some(
            items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        )
    }

    /// Outcome prices; entries that are not numeric become `None` so indices stay aligned.
    pub fn outcome_prices(&self) -> Option<Vec<Option<f64>>> {
        let items = self
            .list("outcomePrices")
            .or_else(|| self.list("outcome_prices"))?;
        Some(
            items
                .iter()
                .map(|v| Numberish::deserialize(v).ok().and_then(|n| n.to_f64()))
                .collect(),
        )
    }

    /// First of `ID_FIELDS` that yields a non-empty string.
    pub fn market_id(&self) -> Option<String> {
        ID_FIELDS.iter().find_map(|name| match self.field(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn title(&self) -> Option<String> {
        self.first_string(TITLE_FIELDS)
    }

    pub fn rules(&self) -> Option<String> {
        self.first_string(RULES_FIELDS)
    }

    pub fn close_time(&self) -> Option<String> {
        self.first_string(CLOSE_TIME_FIELDS)
    }

    pub fn status(&self) -> String {
        let flag = |name: &str| self.field(name).and_then(Value::as_bool).unwrap_or(false);
        if flag("closed") {
            "closed".to_string()
        } else if flag("active") {
            "active".to_string()
        } else {
            self.first_string(&["status"])
                .unwrap_or_else(|| "unknown".to_string())
        }
    }

    fn first_string(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| {
            self.field(name)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
    }
}
