pub mod retry;
pub mod stats_api;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::season::SeasonWindow;
use crate::types::{EntityKind, GameRecord, ScheduledGame};

pub use retry::with_retry;
pub use stats_api::StatsApiSource;

/// Parameters of one game-log fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    pub season: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub timeout: Duration,
}

impl FetchWindow {
    pub fn for_season(season: &SeasonWindow, timeout: Duration) -> Self {
        Self {
            season: season.label.clone(),
            date_from: season.start,
            date_to: season.end,
            timeout,
        }
    }
}

/// Upstream provider of per-game box scores and today's schedule.
///
/// Errors must classify through `AppError::is_transient` so the retry
/// policy can tell a flaky network from a hard failure.
#[async_trait]
pub trait GameLogSource: Send + Sync {
    /// Short name used in logs and fetch errors.
    fn name(&self) -> &str;

    async fn fetch_game_logs(&self, kind: EntityKind, window: &FetchWindow) -> Result<Vec<GameRecord>>;

    async fn fetch_scoreboard(&self, timeout: Duration) -> Result<Vec<ScheduledGame>>;
}
