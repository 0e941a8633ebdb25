use chrono::{Datelike, NaiveDate};

use crate::config::{SEASON_START_DAY, SEASON_START_MONTH};

/// The season that contains a given day, anchored on October 1st.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonWindow {
    /// League label, e.g. `2025-26`.
    pub label: String,
    pub start: NaiveDate,
    /// Last day considered (normally today).
    pub end: NaiveDate,
}

impl SeasonWindow {
    /// Months from October onward belong to the season starting that year;
    /// earlier months to the season that started the previous October.
    pub fn containing(today: NaiveDate) -> Self {
        let start_year = if today.month() >= SEASON_START_MONTH {
            today.year()
        } else {
            today.year() - 1
        };
        let start = NaiveDate::from_ymd_opt(start_year, SEASON_START_MONTH, SEASON_START_DAY)
            .unwrap_or(today);
        let label = format!("{}-{:02}", start_year, (start_year + 1).rem_euclid(100));
        Self {
            label,
            start,
            end: today,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn october_starts_a_new_season() {
        let s = SeasonWindow::containing(d(2025, 10, 21));
        assert_eq!(s.label, "2025-26");
        assert_eq!(s.start, d(2025, 10, 1));
        assert_eq!(s.end, d(2025, 10, 21));
    }

    #[test]
    fn spring_belongs_to_previous_october() {
        let s = SeasonWindow::containing(d(2026, 4, 3));
        assert_eq!(s.label, "2025-26");
        assert_eq!(s.start, d(2025, 10, 1));
    }

    #[test]
    fn century_rollover_label() {
        assert_eq!(SeasonWindow::containing(d(2099, 11, 1)).label, "2099-00");
    }
}
