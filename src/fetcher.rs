use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::{Config, HTTP_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::upstream::UpstreamMarket;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FetchStats {
    pub pages: usize,
    pub api_total: usize,
    pub duplicates: usize,
    /// Stopped because `max_pages` was reached, not because the feed ran dry.
    pub hit_page_cap: bool,
}

/// Fetch open markets from the Gamma REST API, page by page.
///
/// Paging stops on the first short page or once `max_pages` pages have been
/// read. Any non-success status or non-array body fails the whole fetch;
/// nothing partial is returned. Records are deduplicated by market id, first
/// occurrence wins. Records without an id are passed through for ingestion
/// to count.
pub async fn fetch_markets(cfg: &Config) -> Result<(Vec<Value>, FetchStats)> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;

    let mut stats = FetchStats::default();
    let mut markets = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut offset = 0usize;

    loop {
        if stats.pages >= cfg.max_pages {
            stats.hit_page_cap = true;
            break;
        }

        let url = format!(
            "{}/markets?active=true&closed=false&limit={}&offset={}",
            cfg.gamma_api_url, cfg.page_size, offset
        );
        let items = fetch_page(&client, &url).await?;
        let page_len = items.len();
        stats.pages += 1;
        stats.api_total += page_len;
        debug!(offset, rows = page_len, "Fetched market page");

        for item in items {
            let market = UpstreamMarket::new(item);
            if let Some(id) = market.market_id() {
                if !seen.insert(id) {
                    stats.duplicates += 1;
                    continue;
                }
            }
            markets.push(market.into_raw());
        }

        if page_len < cfg.page_size {
            break;
        }
        offset += cfg.page_size;
    }

    info!(
        pages = stats.pages,
        total = stats.api_total,
        duplicates = stats.duplicates,
        page_cap = stats.hit_page_cap,
        "Fetched {} markets in {} pages",
        markets.len(),
        stats.pages,
    );

    Ok((markets, stats))
}

async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<Vec<Value>> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(AppError::Upstream(format!(
            "GAMMA /markets returned HTTP {status}"
        )));
    }

    let body: Value = resp
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("GAMMA /markets body was not JSON: {e}")))?;

    match body {
        Value::Array(items) => Ok(items),
        _ => Err(AppError::Upstream(
            "GAMMA /markets response was not an array".to_string(),
        )),
    }
}
