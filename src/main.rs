mod calculator;
mod config;
mod db;
mod detector;
mod error;
mod fetcher;
mod reconcile;
mod season;
mod types;
mod validation;

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::calculator::StreakConfig;
use crate::config::Config;
use crate::db::SqliteStore;
use crate::error::Result;
use crate::fetcher::StatsApiSource;
use crate::reconcile::Reconciler;
use crate::types::RefreshStage;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Streak refresh failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Collaborators ---
    let store = SqliteStore::connect(&cfg.db_path).await?;
    let source = StatsApiSource::new(&cfg)?;
    match store.refresh_status(RefreshStage::Streaks).await? {
        Some(prev) => info!(
            stage = %prev.stage,
            sport = %prev.sport,
            last_success_at = %prev.last_success_at,
            "Previous streak refresh",
        ),
        None => info!("No previous streak refresh recorded"),
    }
    info!(
        sport = %cfg.sport,
        batch_size = cfg.batch_size,
        max_attempts = cfg.fetch_max_attempts,
        "Collaborators ready",
    );

    // --- One reconciliation pass ---
    let now = Utc::now();
    let reconciler = Reconciler::new(cfg, StreakConfig::nba(), Arc::new(source), Arc::new(store));
    let summary = reconciler.run(now.date_naive(), now).await?;

    for warning in &summary.warnings {
        info!("Run finished with warning: {warning}");
    }
    if summary.shrunk > 0 {
        info!(shrunk = summary.shrunk, "Streaks shrank without breaking; no events recorded for them");
    }

    Ok(())
}
