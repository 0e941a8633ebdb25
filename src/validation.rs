use chrono::NaiveDate;
use tracing::warn;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{EntityKind, GameRecord};

/// Non-fatal data-quality findings. Logged; the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    LowConfidence {
        kind: EntityKind,
        records: usize,
        floor: usize,
    },
    StaleData {
        kind: EntityKind,
        newest: NaiveDate,
        age_days: i64,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::LowConfidence { kind, records, floor } => {
                write!(f, "only {records} {kind} records (expected at least {floor})")
            }
            Warning::StaleData { kind, newest, age_days } => {
                write!(f, "newest {kind} game is {newest} ({age_days} days old)")
            }
        }
    }
}

fn floor_for(cfg: &Config, kind: EntityKind) -> usize {
    match kind {
        EntityKind::Player => cfg.min_player_records,
        EntityKind::Team => cfg.min_team_records,
    }
}

/// Gate freshly fetched logs before they replace anything.
///
/// Zero records is fatal so an empty fetch never overwrites a good snapshot.
/// Thin or stale data only produces warnings.
pub fn validate_logs(
    kind: EntityKind,
    records: &[GameRecord],
    today: NaiveDate,
    cfg: &Config,
) -> Result<Vec<Warning>> {
    if records.is_empty() {
        return Err(AppError::EmptyResult { kind });
    }

    let mut warnings = Vec::new();

    let floor = floor_for(cfg, kind);
    if records.len() < floor {
        warnings.push(Warning::LowConfidence {
            kind,
            records: records.len(),
            floor,
        });
    }

    if let Some(newest) = records.iter().map(|r| r.game_date).max() {
        let age_days = (today - newest).num_days();
        if age_days > cfg.stale_after_days {
            warnings.push(Warning::StaleData {
                kind,
                newest,
                age_days,
            });
        }
    }

    for w in &warnings {
        warn!(kind = %kind, "Game log validation: {w}");
    }

    Ok(warnings)
}
