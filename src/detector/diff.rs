use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::types::{EventType, StreakEvent, StreakKey, StreakRecord};

/// Result of comparing two snapshots.
#[derive(Debug, Default)]
pub struct EventDiff {
    /// `started`/`extended` events in key order, followed by `broken` events in key order.
    pub events: Vec<StreakEvent>,
    /// Keys whose length went down without the streak disappearing. Not a
    /// valid transition; reported, never emitted.
    pub shrunk: Vec<StreakKey>,
}

/// Diff the previous snapshot against the freshly computed one.
///
/// Pure: the same `(old, new, created_at)` always produces the same diff.
pub fn detect_events(old: &[StreakRecord], new: &[StreakRecord], created_at: DateTime<Utc>) -> EventDiff {
    let old_by_key: BTreeMap<StreakKey, &StreakRecord> = old.iter().map(|s| (s.key(), s)).collect();
    let new_by_key: BTreeMap<StreakKey, &StreakRecord> = new.iter().map(|s| (s.key(), s)).collect();

    let mut diff = EventDiff::default();

    for (key, current) in &new_by_key {
        match old_by_key.get(key) {
            None => diff.events.push(event(current, EventType::Started, 0, current.streak_len, created_at)),
            Some(prev) if current.streak_len > prev.streak_len => diff.events.push(event(
                current,
                EventType::Extended,
                prev.streak_len,
                current.streak_len,
                created_at,
            )),
            Some(prev) if current.streak_len < prev.streak_len => {
                warn!(
                    key = %key,
                    prev = prev.streak_len,
                    new = current.streak_len,
                    "Streak shrank without breaking; no event recorded",
                );
                diff.shrunk.push(key.clone());
            }
            Some(_) => {}
        }
    }

    for (key, prev) in &old_by_key {
        if !new_by_key.contains_key(key) {
            diff.events.push(event(prev, EventType::Broken, prev.streak_len, 0, created_at));
        }
    }

    diff
}

fn event(
    source: &StreakRecord,
    event_type: EventType,
    prev_streak_len: u32,
    new_streak_len: u32,
    created_at: DateTime<Utc>,
) -> StreakEvent {
    StreakEvent {
        entity: source.entity.clone(),
        entity_name: source.entity_name.clone(),
        team_abbr: source.team_abbr.clone(),
        sport: source.sport.clone(),
        stat: source.stat,
        threshold: source.threshold,
        event_type,
        prev_streak_len,
        new_streak_len,
        last_game: source.last_game,
        created_at,
    }
}
