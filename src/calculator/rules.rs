use crate::config::MIN_STREAK_LENGTH;
use crate::types::{EntityKind, GameRecord, GameResult, Stat, StatLine};

/// How a game's value is compared against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// value >= threshold
    AtLeast,
    /// value <= threshold
    AtMost,
    /// game result is a win; the threshold is ignored
    Win,
}

/// Inclusive `min..=max` threshold range walked in `step` increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdLadder {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

impl ThresholdLadder {
    pub const fn new(min: u32, max: u32, step: u32) -> Self {
        Self { min, max, step }
    }

    pub fn thresholds(&self) -> Vec<u32> {
        let step = self.step.max(1) as usize;
        (self.min..=self.max).step_by(step).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRule {
    pub stat: Stat,
    pub condition: Condition,
    pub thresholds: Vec<u32>,
}

impl StatRule {
    pub fn new(stat: Stat, condition: Condition, ladder: ThresholdLadder) -> Self {
        Self {
            stat,
            condition,
            thresholds: ladder.thresholds(),
        }
    }

    /// True when `game` satisfies this rule at `threshold`. A missing value
    /// never qualifies.
    pub fn hits(&self, game: &GameRecord, threshold: u32) -> bool {
        match self.condition {
            Condition::Win => game.result == Some(GameResult::Win),
            Condition::AtLeast => stat_value(self.stat, &game.stats).is_some_and(|v| v >= threshold),
            Condition::AtMost => stat_value(self.stat, &game.stats).is_some_and(|v| v <= threshold),
        }
    }
}

/// Numeric value of `stat` in a box-score line. Combined stats are missing
/// when any component is missing.
pub fn stat_value(stat: Stat, line: &StatLine) -> Option<u32> {
    match stat {
        Stat::Points | Stat::PointsUnder => line.pts,
        Stat::Rebounds => line.reb,
        Stat::Assists => line.ast,
        Stat::Threes => line.fg3m,
        Stat::Blocks => line.blk,
        Stat::Steals => line.stl,
        Stat::PointsAssists => Some(line.pts? + line.ast?),
        Stat::PointsRebounds => Some(line.pts? + line.reb?),
        Stat::ReboundsAssists => Some(line.reb? + line.ast?),
        Stat::PointsReboundsAssists => Some(line.pts? + line.reb? + line.ast?),
        Stat::Moneyline => None,
    }
}

/// Immutable stat/threshold tables for one league. Passed by reference into
/// the calculator so several leagues can run with different tables.
#[derive(Debug, Clone)]
pub struct StreakConfig {
    pub min_streak_len: u32,
    pub player_rules: Vec<StatRule>,
    pub team_rules: Vec<StatRule>,
}

impl StreakConfig {
    pub fn nba() -> Self {
        use Condition::*;
        Self {
            min_streak_len: MIN_STREAK_LENGTH,
            player_rules: vec![
                StatRule::new(Stat::Points, AtLeast, ThresholdLadder::new(10, 40, 5)),
                StatRule::new(Stat::Rebounds, AtLeast, ThresholdLadder::new(3, 15, 1)),
                StatRule::new(Stat::Assists, AtLeast, ThresholdLadder::new(3, 15, 1)),
                StatRule::new(Stat::Threes, AtLeast, ThresholdLadder::new(1, 8, 1)),
                StatRule::new(Stat::Blocks, AtLeast, ThresholdLadder::new(1, 5, 1)),
                StatRule::new(Stat::Steals, AtLeast, ThresholdLadder::new(1, 5, 1)),
                StatRule::new(Stat::PointsAssists, AtLeast, ThresholdLadder::new(15, 40, 5)),
                StatRule::new(Stat::PointsRebounds, AtLeast, ThresholdLadder::new(15, 40, 5)),
                StatRule::new(Stat::ReboundsAssists, AtLeast, ThresholdLadder::new(5, 20, 5)),
                StatRule::new(Stat::PointsReboundsAssists, AtLeast, ThresholdLadder::new(20, 50, 5)),
            ],
            team_rules: vec![
                StatRule::new(Stat::Moneyline, Win, ThresholdLadder::new(0, 0, 1)),
                StatRule::new(Stat::Points, AtLeast, ThresholdLadder::new(100, 130, 5)),
                StatRule::new(Stat::PointsUnder, AtMost, ThresholdLadder::new(95, 120, 5)),
            ],
        }
    }

    pub fn rules_for(&self, kind: EntityKind) -> &[StatRule] {
        match kind {
            EntityKind::Player => &self.player_rules,
            EntityKind::Team => &self.team_rules,
        }
    }
}
