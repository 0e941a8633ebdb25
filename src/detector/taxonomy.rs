use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::config::Config;
use crate::types::{EventType, StreakEvent};

/// Maps detector output onto the event types the event table accepts.
#[derive(Debug, Clone)]
pub struct EventTaxonomy {
    allowed: BTreeSet<EventType>,
    fold_started_into_extended: bool,
}

#[derive(Debug, Default)]
pub struct Filtered {
    pub accepted: Vec<StreakEvent>,
    pub rejected: usize,
}

impl EventTaxonomy {
    pub fn new(allowed: impl IntoIterator<Item = EventType>, fold_started_into_extended: bool) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            fold_started_into_extended,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.allowed_event_types.iter().copied(), cfg.fold_started_into_extended)
    }

    pub fn is_allowed(&self, event_type: EventType) -> bool {
        self.allowed.contains(&event_type)
    }

    /// Remap, then drop events whose type is not allowed. Dropped events are
    /// logged per type and counted; they never fail the run.
    pub fn apply(&self, events: Vec<StreakEvent>) -> Filtered {
        let mut filtered = Filtered::default();
        let mut dropped: BTreeMap<EventType, usize> = BTreeMap::new();

        for mut event in events {
            if self.fold_started_into_extended && event.event_type == EventType::Started {
                event.event_type = EventType::Extended;
            }
            if self.is_allowed(event.event_type) {
                filtered.accepted.push(event);
            } else {
                *dropped.entry(event.event_type).or_default() += 1;
                filtered.rejected += 1;
            }
        }

        for (event_type, count) in dropped {
            warn!(
                event_type = %event_type,
                count,
                "Dropping streak events with a type outside the allowed set",
            );
        }

        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityId, Stat};
    use chrono::{NaiveDate, Utc};

    fn event(event_type: EventType) -> StreakEvent {
        StreakEvent {
            entity: EntityId::Player(7),
            entity_name: "Player 7".into(),
            team_abbr: None,
            sport: "NBA".into(),
            stat: Stat::Points,
            threshold: 20,
            event_type,
            prev_streak_len: 0,
            new_streak_len: 3,
            last_game: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn full_taxonomy_keeps_everything() {
        let taxonomy = EventTaxonomy::new([EventType::Started, EventType::Extended, EventType::Broken], false);
        let out = taxonomy.apply(vec![event(EventType::Started), event(EventType::Broken)]);
        assert_eq!(out.accepted.len(), 2);
        assert_eq!(out.rejected, 0);
    }

    #[test]
    fn folding_turns_started_into_extended() {
        let taxonomy = EventTaxonomy::new([EventType::Extended, EventType::Broken], true);
        let out = taxonomy.apply(vec![event(EventType::Started)]);
        assert_eq!(out.rejected, 0);
        assert_eq!(out.accepted[0].event_type, EventType::Extended);
        assert_eq!(out.accepted[0].prev_streak_len, 0);
    }

    #[test]
    fn disallowed_types_are_filtered_not_fatal() {
        let taxonomy = EventTaxonomy::new([EventType::Extended, EventType::Broken], false);
        let out = taxonomy.apply(vec![
            event(EventType::Started),
            event(EventType::Extended),
            event(EventType::Started),
        ]);
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.rejected, 2);
    }
}
