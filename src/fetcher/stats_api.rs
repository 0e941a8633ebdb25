use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::fetcher::{FetchWindow, GameLogSource};
use crate::types::{EntityId, EntityKind, GameRecord, GameResult, ScheduledGame, StatLine};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Game logs from the league stats API, schedule from the CDN scoreboard.
pub struct StatsApiSource {
    client: reqwest::Client,
    stats_api_url: String,
    scoreboard_url: String,
}

impl StatsApiSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.nba.com"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(cfg.fetch_timeout)
            .build()?;

        Ok(Self {
            client,
            stats_api_url: cfg.stats_api_url.trim_end_matches('/').to_string(),
            scoreboard_url: cfg.scoreboard_url.clone(),
        })
    }
}

#[async_trait]
impl GameLogSource for StatsApiSource {
    fn name(&self) -> &str {
        "stats-api"
    }

    async fn fetch_game_logs(&self, kind: EntityKind, window: &FetchWindow) -> Result<Vec<GameRecord>> {
        let endpoint = match kind {
            EntityKind::Player => "playergamelogs",
            EntityKind::Team => "teamgamelogs",
        };
        let url = format!("{}/{}", self.stats_api_url, endpoint);
        let date_from = window.date_from.format("%m/%d/%Y").to_string();
        let date_to = window.date_to.format("%m/%d/%Y").to_string();

        debug!(%url, season = %window.season, %date_from, %date_to, "Fetching {kind} game logs");

        let request = self
            .client
            .get(&url)
            .query(&[
                ("LeagueID", "00"),
                ("Season", window.season.as_str()),
                ("SeasonType", "Regular Season"),
                ("DateFrom", date_from.as_str()),
                ("DateTo", date_to.as_str()),
            ])
            .timeout(window.timeout);
        let body: Value = self.get_json(request).await?;

        let (records, skipped) = parse_game_logs(kind, &body)?;
        if skipped > 0 {
            warn!(kind = %kind, skipped, "Skipped malformed game log rows");
        }
        info!(kind = %kind, records = records.len(), "Fetched {kind} game logs");
        Ok(records)
    }

    async fn fetch_scoreboard(&self, timeout: Duration) -> Result<Vec<ScheduledGame>> {
        let request = self.client.get(&self.scoreboard_url).timeout(timeout);
        let body: ScoreboardResponse = self.get_json(request).await?;
        parse_scoreboard(body)
    }
}

impl StatsApiSource {
    /// Send `request` and decode its JSON body. Timeouts, refused
    /// connections, 5xx and 429 come back as `TransientFetch`.
    async fn get_json<T: DeserializeOwned + Send>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        if let Some(err) = transient_status(self.name(), response.status()) {
            return Err(err);
        }
        Ok(response.error_for_status()?.json().await?)
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() || e.is_connect() {
            AppError::TransientFetch {
                source_name: self.name().to_string(),
                message: e.to_string(),
            }
        } else {
            AppError::Http(e)
        }
    }
}

/// Upstream statuses worth another attempt: server errors and rate limiting.
pub fn transient_status(source_name: &str, status: StatusCode) -> Option<AppError> {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Some(AppError::TransientFetch {
            source_name: source_name.to_string(),
            message: format!("HTTP {status}"),
        })
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Stats API result-set tables
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(rename = "resultSets")]
    result_sets: Vec<ResultSet>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    headers: Vec<String>,
    #[serde(rename = "rowSet")]
    row_set: Vec<Vec<Value>>,
}

/// Column-name lookup over one result set.
struct Columns(HashMap<String, usize>);

impl Columns {
    fn new(headers: &[String], required: &[&str]) -> Result<Self> {
        let map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_ascii_uppercase(), i))
            .collect();
        if let Some(missing) = required.iter().find(|c| !map.contains_key(**c)) {
            return Err(AppError::Schema(format!("result set is missing column {missing}")));
        }
        Ok(Self(map))
    }

    fn get<'r>(&self, row: &'r [Value], name: &str) -> Option<&'r Value> {
        self.0.get(name).and_then(|&i| row.get(i)).filter(|v| !v.is_null())
    }

    fn str<'r>(&self, row: &'r [Value], name: &str) -> Option<&'r str> {
        self.get(row, name).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
    }

    fn count(&self, row: &[Value], name: &str) -> Option<u32> {
        let v = self.get(row, name)?;
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .and_then(|n| u32::try_from(n).ok())
    }

    fn id(&self, row: &[Value], name: &str) -> Option<i64> {
        let v = self.get(row, name)?;
        v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    }
}

const PLAYER_COLUMNS: &[&str] = &[
    "PLAYER_ID", "PLAYER_NAME", "TEAM_ABBREVIATION", "GAME_ID", "GAME_DATE", "PTS", "REB", "AST",
    "FG3M", "BLK", "STL",
];
const TEAM_COLUMNS: &[&str] = &["TEAM_ABBREVIATION", "GAME_ID", "GAME_DATE", "WL", "PTS"];

/// Decode a `playergamelogs`/`teamgamelogs` payload. Returns the records
/// and the number of rows that were skipped as unusable. Missing stat cells
/// stay missing.
pub fn parse_game_logs(kind: EntityKind, body: &Value) -> Result<(Vec<GameRecord>, usize)> {
    let response: StatsResponse = serde_json::from_value(body.clone())?;
    let set = response
        .result_sets
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Schema("response has no result sets".to_string()))?;

    let required = match kind {
        EntityKind::Player => PLAYER_COLUMNS,
        EntityKind::Team => TEAM_COLUMNS,
    };
    let cols = Columns::new(&set.headers, required)?;

    let mut records = Vec::with_capacity(set.row_set.len());
    let mut skipped = 0usize;
    for row in &set.row_set {
        let parsed = match kind {
            EntityKind::Player => parse_player_row(&cols, row),
            EntityKind::Team => parse_team_row(&cols, row),
        };
        match parsed {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }
    Ok((records, skipped))
}

fn parse_player_row(cols: &Columns, row: &[Value]) -> Option<GameRecord> {
    let player_id = cols.id(row, "PLAYER_ID")?;
    Some(GameRecord {
        entity: EntityId::Player(player_id),
        entity_name: cols.str(row, "PLAYER_NAME").unwrap_or_default().to_string(),
        team_abbr: cols.str(row, "TEAM_ABBREVIATION").map(str::to_string),
        game_id: cols.str(row, "GAME_ID")?.to_string(),
        game_date: parse_game_date(cols.str(row, "GAME_DATE")?)?,
        matchup: cols.str(row, "MATCHUP").map(str::to_string),
        result: cols.str(row, "WL").and_then(GameResult::parse),
        stats: StatLine {
            pts: cols.count(row, "PTS"),
            reb: cols.count(row, "REB"),
            ast: cols.count(row, "AST"),
            fg3m: cols.count(row, "FG3M"),
            blk: cols.count(row, "BLK"),
            stl: cols.count(row, "STL"),
        },
    })
}

fn parse_team_row(cols: &Columns, row: &[Value]) -> Option<GameRecord> {
    let abbr = cols.str(row, "TEAM_ABBREVIATION")?.to_string();
    Some(GameRecord {
        entity: EntityId::Team(abbr.clone()),
        entity_name: abbr.clone(),
        team_abbr: Some(abbr),
        game_id: cols.str(row, "GAME_ID")?.to_string(),
        game_date: parse_game_date(cols.str(row, "GAME_DATE")?)?,
        matchup: cols.str(row, "MATCHUP").map(str::to_string),
        result: cols.str(row, "WL").and_then(GameResult::parse),
        stats: StatLine {
            pts: cols.count(row, "PTS"),
            ..StatLine::default()
        },
    })
}

/// Accepts `2025-10-22T00:00:00` and `2025-10-22`.
pub fn parse_game_date(s: &str) -> Option<NaiveDate> {
    let day = s.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

// ---------------------------------------------------------------------------
// CDN scoreboard
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ScoreboardResponse {
    scoreboard: Option<Scoreboard>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scoreboard {
    game_date: Option<String>,
    #[serde(default)]
    games: Vec<ScoreboardGame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreboardGame {
    game_id: String,
    game_status_text: Option<String>,
    #[serde(rename = "gameTimeUTC")]
    game_time_utc: Option<String>,
    home_team: ScoreboardTeam,
    away_team: ScoreboardTeam,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreboardTeam {
    team_tricode: Option<String>,
    score: Option<u32>,
}

fn parse_scoreboard(body: ScoreboardResponse) -> Result<Vec<ScheduledGame>> {
    let board = body
        .scoreboard
        .ok_or_else(|| AppError::Schema("scoreboard payload has no `scoreboard` object".to_string()))?;
    let board_date = board.game_date.as_deref().and_then(parse_game_date);

    let games = board
        .games
        .into_iter()
        .filter_map(|g| {
            let game_date = g
                .game_time_utc
                .as_deref()
                .and_then(parse_game_date)
                .or(board_date)?;
            Some(ScheduledGame {
                id: g.game_id,
                home_team_abbr: g.home_team.team_tricode,
                away_team_abbr: g.away_team.team_tricode,
                home_score: g.home_team.score,
                away_score: g.away_team.score,
                status: g.game_status_text.map(|s| s.trim().to_string()),
                game_date,
            })
        })
        .collect();
    Ok(games)
}
