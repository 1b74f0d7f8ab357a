use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// How far ahead [`CalendarPattern::next_after`] searches before giving up.
/// Eight years covers every Feb 29 pattern.
const SEARCH_HORIZON_DAYS: usize = 8 * 366;

// Field significance, coarsest first. Day and weekday share a rank.
const RANK_YEAR: u8 = 0;
const RANK_MONTH: u8 = 1;
const RANK_DAY: u8 = 2;
const RANK_HOUR: u8 = 3;
const RANK_MINUTE: u8 = 4;
const RANK_SECOND: u8 = 5;
const RANK_NANOSECOND: u8 = 6;

/// A partial set of wall-clock fields (UTC) that a calendar trigger matches.
///
/// Unset fields coarser than the finest set field are wildcards; unset fields
/// finer than it take their minimum value. `{ hour: 9 }` therefore fires daily
/// at 09:00:00, and `{ minute: 30 }` fires every hour at half past.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarPattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// 1 = January … 12 = December.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    /// Day of month, 1-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekday: Option<Weekday>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nanosecond: Option<u32>,
}

impl CalendarPattern {
    /// Every day at HH:MM:00.
    pub fn daily_at(hour: u32, minute: u32) -> Self {
        Self {
            hour: Some(hour),
            minute: Some(minute),
            ..Self::default()
        }
    }

    /// Every week on `weekday` at HH:MM:00.
    pub fn weekly_at(weekday: Weekday, hour: u32, minute: u32) -> Self {
        Self {
            weekday: Some(weekday),
            ..Self::daily_at(hour, minute)
        }
    }

    /// Every month on `day` at HH:MM:00.
    pub fn monthly_on(day: u32, hour: u32, minute: u32) -> Self {
        Self {
            day: Some(day),
            ..Self::daily_at(hour, minute)
        }
    }

    /// Every field of `instant`, down to the nanosecond.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self {
            year: Some(instant.year()),
            month: Some(instant.month()),
            day: Some(instant.day()),
            weekday: None,
            hour: Some(instant.hour()),
            minute: Some(instant.minute()),
            second: Some(instant.second()),
            nanosecond: Some(instant.nanosecond()),
        }
    }

    /// The single instant this pattern names, if every field from year down to
    /// second is set. A missing nanosecond counts as zero.
    pub fn to_instant(&self) -> Option<DateTime<Utc>> {
        let instant = Utc
            .with_ymd_and_hms(
                self.year?,
                self.month?,
                self.day?,
                self.hour?,
                self.minute?,
                self.second?,
            )
            .single()?
            .with_nanosecond(self.nanosecond.unwrap_or(0))?;
        // A pinned weekday that disagrees with the date can never match.
        match self.weekday {
            Some(weekday) if weekday != instant.weekday() => None,
            _ => Some(instant),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.finest_rank().is_none()
    }

    /// Non-empty, and every set field is inside its calendar range.
    pub fn is_valid(&self) -> bool {
        fn in_range(field: Option<u32>, range: std::ops::RangeInclusive<u32>) -> bool {
            field.map_or(true, |v| range.contains(&v))
        }

        !self.is_empty()
            && in_range(self.month, 1..=12)
            && in_range(self.day, 1..=31)
            && in_range(self.hour, 0..=23)
            && in_range(self.minute, 0..=59)
            && in_range(self.second, 0..=59)
            && in_range(self.nanosecond, 0..=999_999_999)
    }

    /// True when `instant` satisfies every resolved field of the pattern.
    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        let Some(fields) = self.resolve() else {
            return false;
        };
        self.year.map_or(true, |y| y == instant.year())
            && self.weekday.map_or(true, |w| w == instant.weekday())
            && fields.month.map_or(true, |m| m == instant.month())
            && fields.day.map_or(true, |d| d == instant.day())
            && fields.hour.map_or(true, |h| h == instant.hour())
            && fields.minute.map_or(true, |m| m == instant.minute())
            && fields.second.map_or(true, |s| s == instant.second())
            && fields.nanosecond == instant.nanosecond()
    }

    /// The first instant strictly after `from` that matches the pattern.
    ///
    /// Returns `None` for empty or out-of-range patterns, for patterns pinned
    /// to a year that has already passed, and when no match exists within
    /// the search horizon (e.g. Feb 30).
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.is_valid() {
            return None;
        }
        if let Some(instant) = self.to_instant() {
            return (instant > from).then_some(instant);
        }
        let fields = self.resolve()?;

        let from_date = from.date_naive();
        let start = match self.year {
            Some(year) if year < from_date.year() => return None,
            Some(year) if year > from_date.year() => NaiveDate::from_ymd_opt(year, 1, 1)?,
            _ => from_date,
        };

        for date in start.iter_days().take(SEARCH_HORIZON_DAYS) {
            if self.year.is_some_and(|y| date.year() > y) {
                return None;
            }
            if !self.date_matches(&fields, date) {
                continue;
            }

            let same_day = date == from_date;
            for hour in candidates(fields.hour, 24) {
                if same_day && hour < from.hour() {
                    continue;
                }
                for minute in candidates(fields.minute, 60) {
                    if same_day && hour == from.hour() && minute < from.minute() {
                        continue;
                    }
                    for second in candidates(fields.second, 60) {
                        let candidate = date
                            .and_hms_nano_opt(hour, minute, second, fields.nanosecond)?
                            .and_utc();
                        if candidate > from {
                            return Some(candidate);
                        }
                    }
                }
            }
        }
        None
    }

    // --- private helpers ---------------------------------------------------

    fn finest_rank(&self) -> Option<u8> {
        [
            (self.nanosecond.is_some(), RANK_NANOSECOND),
            (self.second.is_some(), RANK_SECOND),
            (self.minute.is_some(), RANK_MINUTE),
            (self.hour.is_some(), RANK_HOUR),
            (self.day.is_some() || self.weekday.is_some(), RANK_DAY),
            (self.month.is_some(), RANK_MONTH),
            (self.year.is_some(), RANK_YEAR),
        ]
        .into_iter()
        .find_map(|(set, rank)| set.then_some(rank))
    }

    /// Apply the wildcard/minimum rule. `None` in the result means "any".
    fn resolve(&self) -> Option<Resolved> {
        let finest = self.finest_rank()?;
        let pin = |field: Option<u32>, rank: u8, min: u32| match field {
            Some(v) => Some(v),
            None if rank > finest => Some(min),
            None => None,
        };
        Some(Resolved {
            month: pin(self.month, RANK_MONTH, 1),
            // a weekday alone constrains the day; don't also pin day-of-month
            day: if self.weekday.is_some() {
                self.day
            } else {
                pin(self.day, RANK_DAY, 1)
            },
            hour: pin(self.hour, RANK_HOUR, 0),
            minute: pin(self.minute, RANK_MINUTE, 0),
            second: pin(self.second, RANK_SECOND, 0),
            nanosecond: self.nanosecond.unwrap_or(0),
        })
    }

    fn date_matches(&self, fields: &Resolved, date: NaiveDate) -> bool {
        self.year.map_or(true, |y| y == date.year())
            && self.weekday.map_or(true, |w| w == date.weekday())
            && fields.month.map_or(true, |m| m == date.month())
            && fields.day.map_or(true, |d| d == date.day())
    }
}

struct Resolved {
    month: Option<u32>,
    day: Option<u32>,
    hour: Option<u32>,
    minute: Option<u32>,
    second: Option<u32>,
    nanosecond: u32,
}

fn candidates(fixed: Option<u32>, count: u32) -> std::ops::Range<u32> {
    match fixed {
        Some(v) => v..v + 1,
        None => 0..count,
    }
}

impl fmt::Display for CalendarPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field(value: Option<u32>) -> String {
            value.map_or_else(|| "*".to_string(), |v| format!("{v:02}"))
        }
        // show what actually fires: finer unset fields at their minimum
        let (month, day, hour, minute, second) = match self.resolve() {
            Some(r) => (r.month, r.day, r.hour, r.minute, r.second),
            None => (self.month, self.day, self.hour, self.minute, self.second),
        };
        let year = self.year.map_or_else(|| "*".to_string(), |y| y.to_string());
        write!(
            f,
            "{year}-{}-{} {}:{}:{}",
            field(month),
            field(day),
            field(hour),
            field(minute),
            field(second),
        )?;
        if let Some(weekday) = self.weekday {
            write!(f, " ({weekday})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn daily_fires_later_today() {
        let next = CalendarPattern::daily_at(9, 30).next_after(utc(2026, 3, 10, 8, 0, 0));
        assert_eq!(next, Some(utc(2026, 3, 10, 9, 30, 0)));
    }

    #[test]
    fn daily_rolls_to_tomorrow_once_passed() {
        let next = CalendarPattern::daily_at(9, 30).next_after(utc(2026, 3, 10, 10, 0, 0));
        assert_eq!(next, Some(utc(2026, 3, 11, 9, 30, 0)));
    }

    #[test]
    fn daily_exact_match_is_not_strictly_after() {
        let next = CalendarPattern::daily_at(9, 30).next_after(utc(2026, 3, 10, 9, 30, 0));
        assert_eq!(next, Some(utc(2026, 3, 11, 9, 30, 0)));
    }

    #[test]
    fn weekly_finds_next_monday() {
        // 2026-03-10 is a Tuesday
        let next =
            CalendarPattern::weekly_at(Weekday::Mon, 8, 0).next_after(utc(2026, 3, 10, 12, 0, 0));
        assert_eq!(next, Some(utc(2026, 3, 16, 8, 0, 0)));
    }

    #[test]
    fn minute_only_fires_every_hour() {
        let pattern = CalendarPattern {
            minute: Some(15),
            ..CalendarPattern::default()
        };
        let next = pattern.next_after(utc(2026, 3, 10, 10, 20, 0));
        assert_eq!(next, Some(utc(2026, 3, 10, 11, 15, 0)));
    }

    #[test]
    fn month_only_pins_finer_fields_to_minimum() {
        let pattern = CalendarPattern {
            month: Some(3),
            ..CalendarPattern::default()
        };
        let next = pattern.next_after(utc(2026, 3, 10, 0, 0, 0));
        assert_eq!(next, Some(utc(2027, 3, 1, 0, 0, 0)));
    }

    #[test]
    fn leap_day_is_found_years_ahead() {
        let pattern = CalendarPattern {
            month: Some(2),
            day: Some(29),
            ..CalendarPattern::default()
        };
        let next = pattern.next_after(utc(2026, 3, 1, 0, 0, 0));
        assert_eq!(next, Some(utc(2028, 2, 29, 0, 0, 0)));
    }

    #[test]
    fn past_year_never_fires() {
        let pattern = CalendarPattern {
            year: Some(2020),
            month: Some(1),
            ..CalendarPattern::default()
        };
        assert_eq!(pattern.next_after(utc(2026, 1, 1, 0, 0, 0)), None);
    }

    #[test]
    fn full_instant_resolves_to_itself() {
        let at = utc(2027, 6, 1, 12, 0, 5);
        let pattern = CalendarPattern::from_instant(at);
        assert_eq!(pattern.to_instant(), Some(at));
        assert_eq!(pattern.next_after(utc(2027, 1, 1, 0, 0, 0)), Some(at));
        assert_eq!(pattern.next_after(at), None);
    }

    #[test]
    fn empty_pattern_is_invalid() {
        assert!(CalendarPattern::default().is_empty());
        assert!(!CalendarPattern::default().is_valid());
    }

    #[test]
    fn out_of_range_fields_are_invalid() {
        assert!(!CalendarPattern::daily_at(24, 0).is_valid());
        assert!(!CalendarPattern::daily_at(9, 60).is_valid());
        let bad_month = CalendarPattern {
            month: Some(13),
            ..CalendarPattern::default()
        };
        assert!(!bad_month.is_valid());
        assert!(CalendarPattern::monthly_on(31, 23, 59).is_valid());
    }

    #[test]
    fn matches_uses_resolved_fields() {
        let pattern = CalendarPattern::daily_at(9, 30);
        assert!(pattern.matches(utc(2026, 5, 5, 9, 30, 0)));
        // second resolves to 0
        assert!(!pattern.matches(utc(2026, 5, 5, 9, 30, 1)));
        assert!(!pattern.matches(utc(2026, 5, 5, 10, 30, 0)));
    }

    #[test]
    fn display_marks_wildcards_and_resolved_minimums() {
        let pattern = CalendarPattern::weekly_at(Weekday::Fri, 7, 5);
        assert_eq!(pattern.to_string(), "*-*-* 07:05:00 (Fri)");

        let half_past = CalendarPattern {
            minute: Some(30),
            ..CalendarPattern::default()
        };
        assert_eq!(half_past.to_string(), "*-*-* *:30:00");

        let march = CalendarPattern {
            month: Some(3),
            ..CalendarPattern::default()
        };
        assert_eq!(march.to_string(), "*-03-01 00:00:00");
    }
}
