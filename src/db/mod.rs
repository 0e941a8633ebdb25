pub mod models;
pub mod store;

pub use store::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{GameRecord, RefreshStage, ScheduledGame, StreakEvent, StreakRecord};

/// Persistence collaborator of a refresh run.
///
/// Multi-row writes take a `batch_size` and are split into statements of at
/// most that many rows; a failing chunk surfaces as `AppError::PersistenceChunk`.
#[async_trait]
pub trait StreakStore: Send + Sync {
    /// Idempotent upsert of today's scoreboard, keyed by game id.
    async fn upsert_games_today(
        &self,
        games: &[ScheduledGame],
        batch_size: usize,
        updated_at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Idempotent upsert into the per-kind recent-games tables, keyed by
    /// entity and game.
    async fn upsert_recent_games(&self, records: &[GameRecord], batch_size: usize) -> Result<u64>;

    /// Current snapshot for one sport.
    async fn load_streaks(&self, sport: &str) -> Result<Vec<StreakRecord>>;

    /// Delete every streak of `sport` and insert `records` in its place.
    async fn replace_streaks(
        &self,
        sport: &str,
        records: &[StreakRecord],
        batch_size: usize,
        updated_at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Append one chunk of events. Never updates existing rows.
    async fn insert_events(&self, events: &[StreakEvent]) -> Result<u64>;

    /// Stamp the last successful run of a stage.
    async fn mark_refreshed(&self, stage: RefreshStage, sport: &str, at: DateTime<Utc>) -> Result<()>;
}
