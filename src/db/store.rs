use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::db::models::{RefreshStatusRow, StreakRow};
use crate::db::StreakStore;
use crate::error::{AppError, Result};
use crate::types::{
    EntityId, GameRecord, RefreshStage, ScheduledGame, StreakEvent, StreakRecord,
};

const STREAK_COLUMNS: &str = "sport, entity_kind, entity_key, entity_name, team_abbr, stat, threshold, \
    streak_len, streak_start, last_game, streak_win_pct, season_hits, season_games, season_hit_pct, \
    last5_hits, last5_games, last5_hit_pct, last10_hits, last10_games, last10_hit_pct, \
    last15_hits, last15_games, last15_hit_pct, last20_hits, last20_games, last20_hit_pct";

/// SQLite-backed store. Owns the pool for the duration of a run.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

fn chunk_error(table: &'static str, chunk: usize) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::PersistenceChunk {
        table,
        chunk,
        source: Box::new(AppError::Database(e)),
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database file and apply migrations.
    pub async fn connect(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let store = Self::from_pool(pool).await?;
        info!("Database ready at {db_path}");
        Ok(store)
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Status row of a stage, as read by external monitoring.
    pub async fn refresh_status(&self, stage: RefreshStage) -> Result<Option<RefreshStatusRow>> {
        let row = sqlx::query_as::<_, RefreshStatusRow>(
            "SELECT stage, sport, last_success_at FROM refresh_status WHERE id = ?",
        )
        .bind(stage.id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_player_games(&self, records: &[&GameRecord], batch_size: usize) -> Result<u64> {
        let mut written = 0;
        for (i, chunk) in records.chunks(batch_size).enumerate() {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO player_recent_games (player_id, player_name, team_abbr, game_id, game_date, \
                 matchup, wl, pts, reb, ast, fg3m, blk, stl) ",
            );
            qb.push_values(chunk.iter().copied(), |mut b, r| {
                b.push_bind(r.entity.player_id())
                    .push_bind(r.entity_name.clone())
                    .push_bind(r.team_abbr.clone())
                    .push_bind(r.game_id.clone())
                    .push_bind(r.game_date)
                    .push_bind(r.matchup.clone())
                    .push_bind(r.result.map(|w| w.code()))
                    .push_bind(r.stats.pts.map(i64::from))
                    .push_bind(r.stats.reb.map(i64::from))
                    .push_bind(r.stats.ast.map(i64::from))
                    .push_bind(r.stats.fg3m.map(i64::from))
                    .push_bind(r.stats.blk.map(i64::from))
                    .push_bind(r.stats.stl.map(i64::from));
            });
            qb.push(
                " ON CONFLICT (player_id, game_id) DO UPDATE SET \
                 player_name = excluded.player_name, team_abbr = excluded.team_abbr, \
                 game_date = excluded.game_date, matchup = excluded.matchup, wl = excluded.wl, \
                 pts = excluded.pts, reb = excluded.reb, ast = excluded.ast, \
                 fg3m = excluded.fg3m, blk = excluded.blk, stl = excluded.stl",
            );
            written += qb
                .build()
                .execute(&self.pool)
                .await
                .map_err(chunk_error("player_recent_games", i))?
                .rows_affected();
        }
        Ok(written)
    }

    async fn upsert_team_games(&self, records: &[&GameRecord], batch_size: usize) -> Result<u64> {
        let mut written = 0;
        for (i, chunk) in records.chunks(batch_size).enumerate() {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO team_recent_games (team_abbr, game_id, game_date, matchup, wl, pts) ",
            );
            qb.push_values(chunk.iter().copied(), |mut b, r| {
                b.push_bind(r.entity.key())
                    .push_bind(r.game_id.clone())
                    .push_bind(r.game_date)
                    .push_bind(r.matchup.clone())
                    .push_bind(r.result.map(|w| w.code()))
                    .push_bind(r.stats.pts.map(i64::from));
            });
            qb.push(
                " ON CONFLICT (team_abbr, game_id) DO UPDATE SET \
                 game_date = excluded.game_date, matchup = excluded.matchup, \
                 wl = excluded.wl, pts = excluded.pts",
            );
            written += qb
                .build()
                .execute(&self.pool)
                .await
                .map_err(chunk_error("team_recent_games", i))?
                .rows_affected();
        }
        Ok(written)
    }
}

#[async_trait]
impl StreakStore for SqliteStore {
    async fn upsert_games_today(
        &self,
        games: &[ScheduledGame],
        batch_size: usize,
        updated_at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut written = 0;
        for (i, chunk) in games.chunks(batch_size.max(1)).enumerate() {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO games_today (id, game_date, home_team_abbr, away_team_abbr, \
                 home_score, away_score, status, updated_at) ",
            );
            qb.push_values(chunk, |mut b, g| {
                b.push_bind(g.id.clone())
                    .push_bind(g.game_date)
                    .push_bind(g.home_team_abbr.clone())
                    .push_bind(g.away_team_abbr.clone())
                    .push_bind(g.home_score.map(i64::from))
                    .push_bind(g.away_score.map(i64::from))
                    .push_bind(g.status.clone())
                    .push_bind(updated_at);
            });
            qb.push(
                " ON CONFLICT (id) DO UPDATE SET \
                 game_date = excluded.game_date, home_team_abbr = excluded.home_team_abbr, \
                 away_team_abbr = excluded.away_team_abbr, home_score = excluded.home_score, \
                 away_score = excluded.away_score, status = excluded.status, \
                 updated_at = excluded.updated_at",
            );
            written += qb
                .build()
                .execute(&self.pool)
                .await
                .map_err(chunk_error("games_today", i))?
                .rows_affected();
        }
        Ok(written)
    }

    async fn upsert_recent_games(&self, records: &[GameRecord], batch_size: usize) -> Result<u64> {
        let batch_size = batch_size.max(1);
        let (players, teams): (Vec<&GameRecord>, Vec<&GameRecord>) = records
            .iter()
            .partition(|r| matches!(r.entity, EntityId::Player(_)));

        let written = self.upsert_player_games(&players, batch_size).await?
            + self.upsert_team_games(&teams, batch_size).await?;
        debug!(players = players.len(), teams = teams.len(), "Upserted recent games");
        Ok(written)
    }

    async fn load_streaks(&self, sport: &str) -> Result<Vec<StreakRecord>> {
        let rows = sqlx::query_as::<_, StreakRow>(&format!(
            "SELECT {STREAK_COLUMNS} FROM streaks WHERE sport = ?"
        ))
        .bind(sport)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StreakRecord::try_from).collect()
    }

    async fn replace_streaks(
        &self,
        sport: &str,
        records: &[StreakRecord],
        batch_size: usize,
        updated_at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM streaks WHERE sport = ?")
            .bind(sport)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut inserted = 0;
        for (i, chunk) in records.chunks(batch_size.max(1)).enumerate() {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("INSERT INTO streaks ({STREAK_COLUMNS}, updated_at) "));
            qb.push_values(chunk, |mut b, s| {
                b.push_bind(sport.to_string())
                    .push_bind(s.entity.kind().as_str())
                    .push_bind(s.entity.key())
                    .push_bind(s.entity_name.clone())
                    .push_bind(s.team_abbr.clone())
                    .push_bind(s.stat.code())
                    .push_bind(i64::from(s.threshold))
                    .push_bind(i64::from(s.streak_len))
                    .push_bind(s.streak_start)
                    .push_bind(s.last_game)
                    .push_bind(s.streak_win_pct)
                    .push_bind(i64::from(s.season_hits))
                    .push_bind(i64::from(s.season_games))
                    .push_bind(s.season_hit_pct);
                for w in &s.windows {
                    b.push_bind(i64::from(w.hits))
                        .push_bind(i64::from(w.games))
                        .push_bind(w.hit_pct);
                }
                b.push_bind(updated_at);
            });
            // Dropping `tx` on error rolls the delete back.
            inserted += qb
                .build()
                .execute(&mut *tx)
                .await
                .map_err(chunk_error("streaks", i))?
                .rows_affected();
        }

        tx.commit().await?;
        info!(sport, deleted, inserted, "Replaced streak snapshot");
        Ok(inserted)
    }

    async fn insert_events(&self, events: &[StreakEvent]) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO streak_events (sport, entity_kind, entity_key, entity_name, team_abbr, \
             stat, threshold, event_type, prev_streak_len, new_streak_len, last_game, created_at) ",
        );
        qb.push_values(events, |mut b, e| {
            b.push_bind(e.sport.clone())
                .push_bind(e.entity.kind().as_str())
                .push_bind(e.entity.key())
                .push_bind(e.entity_name.clone())
                .push_bind(e.team_abbr.clone())
                .push_bind(e.stat.code())
                .push_bind(i64::from(e.threshold))
                .push_bind(e.event_type.as_str())
                .push_bind(i64::from(e.prev_streak_len))
                .push_bind(i64::from(e.new_streak_len))
                .push_bind(e.last_game)
                .push_bind(e.created_at);
        });
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn mark_refreshed(&self, stage: RefreshStage, sport: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_status (id, stage, sport, last_success_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                stage = excluded.stage,
                sport = excluded.sport,
                last_success_at = excluded.last_success_at
            "#,
        )
        .bind(stage.id())
        .bind(stage.name())
        .bind(sport)
        .bind(at)
        .execute(&self.pool)
        .await?;
        debug!(stage = stage.name(), "Stamped refresh status");
        Ok(())
    }
}
