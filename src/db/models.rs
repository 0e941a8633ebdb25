//! Database row types matching `migrations/0001_init.sql`.
//! Used by sqlx for typed reads.

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::{WINDOW_COUNT, WINDOW_SIZES};
use crate::error::{AppError, Result};
use crate::types::{EntityId, EntityKind, Stat, StreakRecord, WindowStat};

#[derive(Debug, sqlx::FromRow)]
pub struct StreakRow {
    pub sport: String,
    pub entity_kind: String,
    pub entity_key: String,
    pub entity_name: String,
    pub team_abbr: Option<String>,
    pub stat: String,
    pub threshold: i64,
    pub streak_len: i64,
    pub streak_start: NaiveDate,
    pub last_game: NaiveDate,
    pub streak_win_pct: f64,
    pub season_hits: i64,
    pub season_games: i64,
    pub season_hit_pct: f64,
    pub last5_hits: i64,
    pub last5_games: i64,
    pub last5_hit_pct: Option<f64>,
    pub last10_hits: i64,
    pub last10_games: i64,
    pub last10_hit_pct: Option<f64>,
    pub last15_hits: i64,
    pub last15_games: i64,
    pub last15_hit_pct: Option<f64>,
    pub last20_hits: i64,
    pub last20_games: i64,
    pub last20_hit_pct: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct RefreshStatusRow {
    pub stage: String,
    pub sport: String,
    pub last_success_at: DateTime<Utc>,
}

fn count(column: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| AppError::Schema(format!("streaks.{column} out of range: {value}")))
}

impl TryFrom<StreakRow> for StreakRecord {
    type Error = AppError;

    fn try_from(row: StreakRow) -> Result<Self> {
        let kind = EntityKind::parse(&row.entity_kind)
            .ok_or_else(|| AppError::Schema(format!("unknown entity kind {:?}", row.entity_kind)))?;
        let entity = EntityId::from_parts(kind, &row.entity_key)
            .ok_or_else(|| AppError::Schema(format!("bad {kind} key {:?}", row.entity_key)))?;
        let stat = Stat::from_code(&row.stat)
            .ok_or_else(|| AppError::Schema(format!("unknown stat {:?}", row.stat)))?;

        let columns = [
            (row.last5_hits, row.last5_games, row.last5_hit_pct),
            (row.last10_hits, row.last10_games, row.last10_hit_pct),
            (row.last15_hits, row.last15_games, row.last15_hit_pct),
            (row.last20_hits, row.last20_games, row.last20_hit_pct),
        ];
        let mut windows = [WindowStat { size: 0, hits: 0, games: 0, hit_pct: None }; WINDOW_COUNT];
        for ((slot, size), (hits, games, hit_pct)) in windows.iter_mut().zip(WINDOW_SIZES).zip(columns) {
            *slot = WindowStat {
                size,
                hits: count("window_hits", hits)?,
                games: count("window_games", games)?,
                hit_pct,
            };
        }

        Ok(StreakRecord {
            entity,
            entity_name: row.entity_name,
            team_abbr: row.team_abbr,
            sport: row.sport,
            stat,
            threshold: count("threshold", row.threshold)?,
            streak_len: count("streak_len", row.streak_len)?,
            streak_start: row.streak_start,
            last_game: row.last_game,
            streak_win_pct: row.streak_win_pct,
            season_hits: count("season_hits", row.season_hits)?,
            season_games: count("season_games", row.season_games)?,
            season_hit_pct: row.season_hit_pct,
            windows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> StreakRow {
        let d = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        StreakRow {
            sport: "NBA".into(),
            entity_kind: "team".into(),
            entity_key: "BOS".into(),
            entity_name: "BOS".into(),
            team_abbr: Some("BOS".into()),
            stat: "ML".into(),
            threshold: 0,
            streak_len: 4,
            streak_start: d,
            last_game: d,
            streak_win_pct: 100.0,
            season_hits: 20,
            season_games: 30,
            season_hit_pct: 66.67,
            last5_hits: 4,
            last5_games: 5,
            last5_hit_pct: Some(80.0),
            last10_hits: 7,
            last10_games: 10,
            last10_hit_pct: Some(70.0),
            last15_hits: 10,
            last15_games: 15,
            last15_hit_pct: Some(66.67),
            last20_hits: 13,
            last20_games: 20,
            last20_hit_pct: Some(65.0),
        }
    }

    #[test]
    fn row_maps_to_team_record() {
        let record = StreakRecord::try_from(row()).unwrap();
        assert_eq!(record.entity, EntityId::Team("BOS".into()));
        assert_eq!(record.stat, Stat::Moneyline);
        assert_eq!(record.window(10).unwrap().hits, 7);
        assert_eq!(record.window(20).unwrap().hit_pct, Some(65.0));
    }

    #[test]
    fn unknown_stat_is_rejected() {
        let mut bad = row();
        bad.stat = "FGA".into();
        assert!(matches!(StreakRecord::try_from(bad), Err(AppError::Schema(_))));
    }
}
