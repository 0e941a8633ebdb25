use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::calculator::rules::{StatRule, StreakConfig};
use crate::config::WINDOW_SIZES;
use crate::types::{EntityId, GameRecord, StreakRecord, WindowStat};

/// Percentage of a streak's own games that qualified. Always 100 by construction.
const STREAK_WIN_PCT: f64 = 100.0;

/// Compute every qualifying streak for one entity.
///
/// `games` must all belong to the same entity. They are ordered most recent
/// first; games sharing a date are ordered by descending `game_id`, which
/// follows the league's chronological game numbering.
pub fn compute_entity_streaks(games: &[GameRecord], sport: &str, cfg: &StreakConfig) -> Vec<StreakRecord> {
    let mut ordered: Vec<&GameRecord> = games.iter().collect();
    ordered.sort_by(|a, b| {
        b.game_date
            .cmp(&a.game_date)
            .then_with(|| b.game_id.cmp(&a.game_id))
    });

    let Some(latest) = ordered.first() else {
        return Vec::new();
    };

    let mut streaks = Vec::new();
    for rule in cfg.rules_for(latest.entity.kind()) {
        for &threshold in &rule.thresholds {
            if let Some(streak) = streak_for(&ordered, rule, threshold, sport, cfg.min_streak_len) {
                streaks.push(streak);
            }
        }
    }
    streaks
}

fn streak_for(
    ordered: &[&GameRecord],
    rule: &StatRule,
    threshold: u32,
    sport: &str,
    min_streak_len: u32,
) -> Option<StreakRecord> {
    let latest = ordered.first()?;

    let streak_len = ordered
        .iter()
        .take_while(|g| rule.hits(g, threshold))
        .count();
    if (streak_len as u32) < min_streak_len || streak_len == 0 {
        return None;
    }
    let streak_start = ordered[streak_len - 1].game_date;

    let season_hits = count_hits(ordered, rule, threshold);
    let season_games = ordered.len() as u32;

    let windows = WINDOW_SIZES.map(|size| {
        let window = &ordered[..size.min(ordered.len())];
        let hits = count_hits(window, rule, threshold);
        let games = window.len() as u32;
        WindowStat {
            size,
            hits,
            games,
            hit_pct: hit_pct(hits, games),
        }
    });

    Some(StreakRecord {
        entity: latest.entity.clone(),
        entity_name: latest.entity_name.clone(),
        team_abbr: latest.team_abbr.clone(),
        sport: sport.to_string(),
        stat: rule.stat,
        threshold,
        streak_len: streak_len as u32,
        streak_start,
        last_game: latest.game_date,
        streak_win_pct: STREAK_WIN_PCT,
        season_hits,
        season_games,
        season_hit_pct: hit_pct(season_hits, season_games).unwrap_or(0.0),
        windows,
    })
}

fn count_hits(games: &[&GameRecord], rule: &StatRule, threshold: u32) -> u32 {
    games.iter().filter(|g| rule.hits(g, threshold)).count() as u32
}

/// Hit percentage rounded to two decimals; `None` for an empty window.
fn hit_pct(hits: u32, games: u32) -> Option<f64> {
    if games == 0 {
        return None;
    }
    let pct = f64::from(hits) / f64::from(games) * 100.0;
    Some((pct * 100.0).round() / 100.0)
}

/// Group records by entity and compute every entity's streaks.
///
/// Output is ordered by entity, then by rule table order. A repeated
/// (entity, game_id) pair is counted once.
pub fn compute_snapshot(records: &[GameRecord], sport: &str, cfg: &StreakConfig) -> Vec<StreakRecord> {
    let mut by_entity: BTreeMap<&EntityId, Vec<GameRecord>> = BTreeMap::new();
    let mut seen: HashSet<(&EntityId, &str)> = HashSet::new();
    let mut duplicates = 0usize;

    for record in records {
        if !seen.insert((&record.entity, record.game_id.as_str())) {
            duplicates += 1;
            continue;
        }
        by_entity.entry(&record.entity).or_default().push(record.clone());
    }

    if duplicates > 0 {
        debug!(duplicates, "Skipped repeated entity/game records");
    }

    by_entity
        .values()
        .flat_map(|games| compute_entity_streaks(games, sport, cfg))
        .collect()
}
