use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WINDOW_COUNT;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Team,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Team => "team",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "player" => Some(EntityKind::Player),
            "team" => Some(EntityKind::Team),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of a streak subject. Players are keyed by numeric id, teams by
/// abbreviation; the variant is the kind, so the two can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityId {
    Player(i64),
    Team(String),
}

impl EntityId {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityId::Player(_) => EntityKind::Player,
            EntityId::Team(_) => EntityKind::Team,
        }
    }

    /// Storage form of the identifier (`entity_key` column).
    pub fn key(&self) -> String {
        match self {
            EntityId::Player(id) => id.to_string(),
            EntityId::Team(abbr) => abbr.clone(),
        }
    }

    pub fn player_id(&self) -> Option<i64> {
        match self {
            EntityId::Player(id) => Some(*id),
            EntityId::Team(_) => None,
        }
    }

    pub fn from_parts(kind: EntityKind, key: &str) -> Option<Self> {
        match kind {
            EntityKind::Player => key.parse().ok().map(EntityId::Player),
            EntityKind::Team if !key.is_empty() => Some(EntityId::Team(key.to_string())),
            EntityKind::Team => None,
        }
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stat {
    Points,
    Rebounds,
    Assists,
    Threes,
    Blocks,
    Steals,
    PointsAssists,
    PointsRebounds,
    ReboundsAssists,
    PointsReboundsAssists,
    /// Team points at or under the threshold.
    PointsUnder,
    /// Team wins.
    Moneyline,
}

impl Stat {
    pub const ALL: [Stat; 12] = [
        Stat::Points,
        Stat::Rebounds,
        Stat::Assists,
        Stat::Threes,
        Stat::Blocks,
        Stat::Steals,
        Stat::PointsAssists,
        Stat::PointsRebounds,
        Stat::ReboundsAssists,
        Stat::PointsReboundsAssists,
        Stat::PointsUnder,
        Stat::Moneyline,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Stat::Points => "PTS",
            Stat::Rebounds => "REB",
            Stat::Assists => "AST",
            Stat::Threes => "3PM",
            Stat::Blocks => "BLK",
            Stat::Steals => "STL",
            Stat::PointsAssists => "PA",
            Stat::PointsRebounds => "PR",
            Stat::ReboundsAssists => "RA",
            Stat::PointsReboundsAssists => "PRA",
            Stat::PointsUnder => "PTS_U",
            Stat::Moneyline => "ML",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Stat::ALL.into_iter().find(|s| s.code() == code)
    }
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    Win,
    Loss,
}

impl GameResult {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "W" | "w" => Some(GameResult::Win),
            "L" | "l" => Some(GameResult::Loss),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GameResult::Win => "W",
            GameResult::Loss => "L",
        }
    }
}

/// Box-score numbers for one entity in one game. `None` means the upstream
/// did not report the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatLine {
    pub pts: Option<u32>,
    pub reb: Option<u32>,
    pub ast: Option<u32>,
    pub fg3m: Option<u32>,
    pub blk: Option<u32>,
    pub stl: Option<u32>,
}

// ---------------------------------------------------------------------------
// Game records (input)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub entity: EntityId,
    /// Player name, or the team abbreviation for teams.
    pub entity_name: String,
    pub team_abbr: Option<String>,
    pub game_id: String,
    pub game_date: NaiveDate,
    pub matchup: Option<String>,
    pub result: Option<GameResult>,
    pub stats: StatLine,
}

// ---------------------------------------------------------------------------
// Streak snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreakKey {
    pub entity: EntityId,
    pub stat: Stat,
    pub threshold: u32,
}

impl std::fmt::Display for StreakKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.entity, self.stat, self.threshold)
    }
}

/// Hit rate over the `size` most recent games.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStat {
    pub size: usize,
    pub hits: u32,
    pub games: u32,
    /// `None` when the window holds no games.
    pub hit_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub entity: EntityId,
    pub entity_name: String,
    pub team_abbr: Option<String>,
    pub sport: String,
    pub stat: Stat,
    pub threshold: u32,
    pub streak_len: u32,
    pub streak_start: NaiveDate,
    pub last_game: NaiveDate,
    pub streak_win_pct: f64,
    pub season_hits: u32,
    pub season_games: u32,
    pub season_hit_pct: f64,
    /// One entry per `WINDOW_SIZES` element, same order.
    pub windows: [WindowStat; WINDOW_COUNT],
}

impl StreakRecord {
    pub fn key(&self) -> StreakKey {
        StreakKey {
            entity: self.entity.clone(),
            stat: self.stat,
            threshold: self.threshold,
        }
    }

    #[cfg(test)]
    pub fn window(&self, size: usize) -> Option<&WindowStat> {
        self.windows.iter().find(|w| w.size == size)
    }
}

// ---------------------------------------------------------------------------
// Streak events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Started,
    Extended,
    Broken,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Started => "started",
            EventType::Extended => "extended",
            EventType::Broken => "broken",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "started" => Some(EventType::Started),
            "extended" => Some(EventType::Extended),
            "broken" => Some(EventType::Broken),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakEvent {
    pub entity: EntityId,
    pub entity_name: String,
    pub team_abbr: Option<String>,
    pub sport: String,
    pub stat: Stat,
    pub threshold: u32,
    pub event_type: EventType,
    pub prev_streak_len: u32,
    pub new_streak_len: u32,
    pub last_game: NaiveDate,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Schedule + status
// ---------------------------------------------------------------------------

/// One row of today's scoreboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledGame {
    pub id: String,
    pub home_team_abbr: Option<String>,
    pub away_team_abbr: Option<String>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub status: Option<String>,
    pub game_date: NaiveDate,
}

/// Logical pipeline stage stamped in `refresh_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStage {
    Streaks,
    Games,
}

impl RefreshStage {
    /// Fixed row id of the stage in `refresh_status`.
    pub fn id(&self) -> i64 {
        match self {
            RefreshStage::Streaks => 1,
            RefreshStage::Games => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RefreshStage::Streaks => "players_and_streaks",
            RefreshStage::Games => "games",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_and_team_ids_never_collide() {
        let player = EntityId::Player(1610);
        let team = EntityId::Team("1610".to_string());
        assert_eq!(player.key(), team.key());
        assert_ne!(player, team);
        assert_ne!(player.kind(), team.kind());
    }

    #[test]
    fn entity_id_round_trips_through_storage_parts() {
        let id = EntityId::from_parts(EntityKind::Player, "203999").unwrap();
        assert_eq!(id, EntityId::Player(203999));
        assert!(EntityId::from_parts(EntityKind::Player, "BOS").is_none());
        assert!(EntityId::from_parts(EntityKind::Team, "").is_none());
    }

    #[test]
    fn stat_codes_are_unique() {
        for stat in Stat::ALL {
            assert_eq!(Stat::from_code(stat.code()), Some(stat));
        }
        assert_eq!(Stat::from_code("XYZ"), None);
    }
}
