mod api;
mod config;
mod db;
mod error;
mod fetcher;
mod ingest;
mod movers;
mod normalizer;
mod pipeline;
mod types;
mod upstream;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::db::SnapshotStore;
use crate::error::Result;
use crate::pipeline::{run_once, RunSummary};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[{}] {e}", e.category());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "run".to_string());
    let result = match command.as_str() {
        "run" => run(cfg).await,
        "serve" => serve(cfg).await,
        other => {
            eprintln!("Unknown command '{other}'. Usage: movers [run|serve]");
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!(category = e.category(), "Run failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    let store = SnapshotStore::new(pool);
    let summary = run_once(&cfg, &store).await?;
    log_summary(&summary);
    Ok(())
}

async fn serve(cfg: Config) -> Result<()> {
    let pool = db::connect(&cfg.db_path).await?;
    let app = router(ApiState {
        pool,
        platform: cfg.platform_id.clone(),
    });

    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

fn log_summary(s: &RunSummary) {
    let per_window = s
        .moves
        .iter()
        .map(|(w, n)| format!("{w}={n}"))
        .collect::<Vec<_>>()
        .join(" ");
    let total_moves: usize = s.moves.iter().map(|(_, n)| n).sum();

    info!(
        event = "RUN_COMPLETE",
        run_ts = s.run_ts,
        pages = s.fetch.pages,
        duplicates = s.fetch.duplicates,
        page_cap = s.fetch.hit_page_cap,
        fetched = s.fetched,
        markets = s.markets_upserted,
        snapshots = s.snapshots_upserted,
        unknown = s.unknown_probabilities,
        skipped_no_id = s.skipped_no_id,
        moves = total_moves,
        total_markets = s.totals.markets,
        total_snapshots = s.totals.snapshots,
        total_moves = s.totals.moves,
        "RUN COMPLETE | fetched: {} in {} pages | markets: {} | snapshots: {} ({} unknown) | moves: {} | stored: {} markets, {} snapshots, {} moves",
        s.fetched,
        s.fetch.pages,
        s.markets_upserted,
        s.snapshots_upserted,
        s.unknown_probabilities,
        per_window,
        s.totals.markets,
        s.totals.snapshots,
        s.totals.moves,
    );
}
