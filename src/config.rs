use std::time::Duration;

use crate::error::{AppError, Result};
use crate::types::EventType;

pub const STATS_API_URL: &str = "https://stats.nba.com/stats";
pub const SCOREBOARD_URL: &str =
    "https://cdn.nba.com/static/json/liveData/scoreboard/todaysScoreboard_00.json";

/// A streak shorter than this is never materialized.
pub const MIN_STREAK_LENGTH: u32 = 3;

pub const WINDOW_COUNT: usize = 4;

/// Rolling hit-rate windows, most recent N games.
pub const WINDOW_SIZES: [usize; WINDOW_COUNT] = [5, 10, 15, 20];

/// Backoff between upstream fetch attempts in milliseconds. The last value
/// repeats when the attempt cap exceeds the schedule length.
pub const FETCH_BACKOFF_MS: &[u64] = &[500, 1_000, 2_000, 4_000];

/// Rows per write statement for upserts, snapshot inserts and event inserts.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Seasons start on this calendar day (October 1st).
pub const SEASON_START_MONTH: u32 = 10;
pub const SEASON_START_DAY: u32 = 1;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    /// League label written on every row and used to scope the snapshot (SPORT).
    pub sport: String,
    pub stats_api_url: String,
    pub scoreboard_url: String,
    pub fetch_timeout: Duration,
    pub fetch_max_attempts: u32,
    pub batch_size: usize,
    /// Newest game older than this many days logs a stale-data warning (STALE_AFTER_DAYS).
    pub stale_after_days: i64,
    /// Low-confidence floor for player records (MIN_PLAYER_RECORDS).
    pub min_player_records: usize,
    /// Low-confidence floor for team records (MIN_TEAM_RECORDS).
    pub min_team_records: usize,
    /// Event types the event table accepts (ALLOWED_EVENT_TYPES, comma-separated).
    pub allowed_event_types: Vec<EventType>,
    /// Record new streaks as `extended` (FOLD_STARTED_INTO_EXTENDED).
    pub fold_started_into_extended: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            db_path: "streaks.db".to_string(),
            sport: "NBA".to_string(),
            stats_api_url: STATS_API_URL.to_string(),
            scoreboard_url: SCOREBOARD_URL.to_string(),
            fetch_timeout: Duration::from_secs(30),
            fetch_max_attempts: 4,
            batch_size: DEFAULT_BATCH_SIZE,
            stale_after_days: 2,
            min_player_records: 150,
            min_team_records: 20,
            allowed_event_types: vec![EventType::Started, EventType::Extended, EventType::Broken],
            fold_started_into_extended: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            db_path: std::env::var("DB_PATH").unwrap_or(defaults.db_path),
            sport: std::env::var("SPORT").unwrap_or(defaults.sport),
            stats_api_url: std::env::var("STATS_API_URL").unwrap_or(defaults.stats_api_url),
            scoreboard_url: std::env::var("SCOREBOARD_URL").unwrap_or(defaults.scoreboard_url),
            fetch_timeout: Duration::from_secs(env_parse("FETCH_TIMEOUT_SECS", defaults.fetch_timeout.as_secs())?),
            fetch_max_attempts: env_parse("FETCH_MAX_ATTEMPTS", defaults.fetch_max_attempts)?
                .max(1),
            batch_size: env_parse("BATCH_SIZE", defaults.batch_size)?.max(1),
            stale_after_days: env_parse("STALE_AFTER_DAYS", defaults.stale_after_days)?,
            min_player_records: env_parse("MIN_PLAYER_RECORDS", defaults.min_player_records)?,
            min_team_records: env_parse("MIN_TEAM_RECORDS", defaults.min_team_records)?,
            allowed_event_types: match std::env::var("ALLOWED_EVENT_TYPES") {
                Ok(raw) => parse_event_types(&raw)?,
                Err(_) => defaults.allowed_event_types,
            },
            fold_started_into_extended: env_parse(
                "FOLD_STARTED_INTO_EXTENDED",
                defaults.fold_started_into_extended,
            )?,
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn parse_event_types(raw: &str) -> Result<Vec<EventType>> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            EventType::parse(s)
                .ok_or_else(|| AppError::Config(format!("unknown event type in ALLOWED_EVENT_TYPES: {s}")))
        })
        .collect()
}
