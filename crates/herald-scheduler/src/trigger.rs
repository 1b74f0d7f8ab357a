use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::CalendarPattern;

/// Smallest delay a one-shot interval trigger may carry (milliseconds).
pub const MIN_DELAY_MS: i64 = 1;
/// Platform floor for repeating interval triggers (seconds).
pub const MIN_REPEAT_INTERVAL_SECS: i64 = 60;

pub fn min_delay() -> Duration {
    Duration::milliseconds(MIN_DELAY_MS)
}

pub fn min_repeat_interval() -> Duration {
    Duration::seconds(MIN_REPEAT_INTERVAL_SECS)
}

/// When a notification fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerTime {
    /// Fire once, `delay` after scheduling.
    After {
        #[serde(with = "duration_ms")]
        delay: Duration,
    },

    /// Fire repeatedly, every `interval`. Must be at least one minute.
    Every {
        #[serde(with = "duration_ms")]
        interval: Duration,
    },

    /// Fire once when the wall clock reaches `at`.
    At { at: DateTime<Utc> },

    /// Fire every time the wall clock matches `pattern`.
    Repeating { pattern: CalendarPattern },
}

impl TriggerTime {
    /// One-shot delay. Non-positive delays are normalized to [`min_delay`].
    pub fn after(delay: Duration) -> Self {
        if delay <= Duration::zero() {
            debug!(
                delay_ms = delay.num_milliseconds(),
                "non-positive delay normalized to minimum"
            );
            return Self::now();
        }
        TriggerTime::After { delay }
    }

    pub fn every(interval: Duration) -> Self {
        TriggerTime::Every { interval }
    }

    pub fn at(at: DateTime<Utc>) -> Self {
        TriggerTime::At { at }
    }

    pub fn repeating(pattern: CalendarPattern) -> Self {
        TriggerTime::Repeating { pattern }
    }

    /// Fire as soon as the store allows.
    pub fn now() -> Self {
        TriggerTime::After { delay: min_delay() }
    }

    /// Structural validity. Never consults the clock: an `At` in the past is
    /// valid and the store decides whether it fires immediately.
    pub fn is_valid(&self) -> bool {
        match self {
            TriggerTime::After { delay } => *delay > Duration::zero(),
            TriggerTime::Every { interval } => *interval >= min_repeat_interval(),
            TriggerTime::At { .. } => true,
            TriggerTime::Repeating { pattern } => pattern.is_valid(),
        }
    }

    /// Whether the trigger repeats when no override is given.
    pub fn repeats_by_default(&self) -> bool {
        matches!(
            self,
            TriggerTime::Every { .. } | TriggerTime::Repeating { .. }
        )
    }

    /// Convert to the store's trigger representation.
    ///
    /// `repeat_override` replaces the variant's natural repetition. An `After`
    /// with a non-positive delay becomes a calendar trigger at now + the
    /// minimum delay rather than an error.
    pub fn to_store_trigger(&self, repeat_override: Option<bool>) -> StoreTrigger {
        let repeats = repeat_override.unwrap_or_else(|| self.repeats_by_default());
        match self {
            TriggerTime::After { delay } if *delay > Duration::zero() => {
                StoreTrigger::TimeInterval {
                    interval: *delay,
                    repeats,
                }
            }
            TriggerTime::After { delay } => {
                debug!(
                    delay_ms = delay.num_milliseconds(),
                    "non-positive delay, falling back to calendar trigger"
                );
                TriggerTime::At {
                    at: Utc::now() + min_delay(),
                }
                .to_store_trigger(repeat_override)
            }
            TriggerTime::Every { interval } => StoreTrigger::TimeInterval {
                interval: *interval,
                repeats,
            },
            TriggerTime::At { at } => StoreTrigger::Calendar {
                pattern: CalendarPattern::from_instant(*at),
                repeats,
            },
            TriggerTime::Repeating { pattern } => StoreTrigger::Calendar {
                pattern: pattern.clone(),
                repeats,
            },
        }
    }

    /// Rebuild a trigger from what the store holds.
    ///
    /// A non-repeating calendar trigger naming a single instant maps back to
    /// `At`; any other calendar trigger maps to `Repeating`.
    pub fn from_store(trigger: &StoreTrigger) -> Self {
        match trigger {
            StoreTrigger::TimeInterval {
                interval,
                repeats: true,
            } => TriggerTime::Every {
                interval: *interval,
            },
            StoreTrigger::TimeInterval {
                interval,
                repeats: false,
            } => TriggerTime::After { delay: *interval },
            StoreTrigger::Calendar {
                pattern,
                repeats: false,
            } => match pattern.to_instant() {
                Some(at) => TriggerTime::At { at },
                None => TriggerTime::Repeating {
                    pattern: pattern.clone(),
                },
            },
            StoreTrigger::Calendar { pattern, .. } => TriggerTime::Repeating {
                pattern: pattern.clone(),
            },
        }
    }
}

impl fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerTime::After { delay } => write!(f, "after {}ms", delay.num_milliseconds()),
            TriggerTime::Every { interval } => write!(f, "every {}s", interval.num_seconds()),
            TriggerTime::At { at } => write!(f, "at {}", at.to_rfc3339()),
            TriggerTime::Repeating { pattern } => write!(f, "repeating {pattern}"),
        }
    }
}

/// Trigger as the platform store understands it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreTrigger {
    /// Relative to the moment the request was enqueued.
    TimeInterval {
        #[serde(with = "duration_ms")]
        interval: Duration,
        repeats: bool,
    },

    /// Matches wall-clock fields.
    Calendar {
        pattern: CalendarPattern,
        repeats: bool,
    },
}

impl StoreTrigger {
    pub fn repeats(&self) -> bool {
        match self {
            StoreTrigger::TimeInterval { repeats, .. } | StoreTrigger::Calendar { repeats, .. } => {
                *repeats
            }
        }
    }

    /// Calendar triggers are absolute and can be resubmitted unchanged;
    /// interval triggers would restart their countdown.
    pub fn is_calendar(&self) -> bool {
        matches!(self, StoreTrigger::Calendar { .. })
    }

    pub fn with_repeats(&self, repeats: bool) -> Self {
        let mut trigger = self.clone();
        match &mut trigger {
            StoreTrigger::TimeInterval { repeats: r, .. }
            | StoreTrigger::Calendar { repeats: r, .. } => *r = repeats,
        }
        trigger
    }

    /// Next fire time. For interval triggers `from` is taken as the enqueue
    /// (or last fire) instant.
    pub fn next_fire_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            StoreTrigger::TimeInterval { interval, .. } => from.checked_add_signed(*interval),
            StoreTrigger::Calendar { pattern, .. } => pattern.next_after(from),
        }
    }
}

/// `chrono::Duration` as integer milliseconds.
mod duration_ms {
    use chrono::Duration;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = i64::deserialize(d)?;
        Duration::try_milliseconds(ms)
            .ok_or_else(|| D::Error::custom(format!("duration out of range: {ms}ms")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Weekday};

    use super::*;

    #[test]
    fn after_requires_positive_delay() {
        assert!(TriggerTime::After {
            delay: Duration::seconds(10)
        }
        .is_valid());
        assert!(!TriggerTime::After {
            delay: Duration::zero()
        }
        .is_valid());
        assert!(!TriggerTime::After {
            delay: Duration::seconds(-5)
        }
        .is_valid());
    }

    #[test]
    fn after_constructor_normalizes_zero() {
        let trigger = TriggerTime::after(Duration::zero());
        assert_eq!(trigger, TriggerTime::now());
        assert!(trigger.is_valid());
    }

    #[test]
    fn non_positive_after_falls_back_to_near_future_calendar() {
        for delay in [Duration::zero(), Duration::seconds(-30)] {
            let before = Utc::now();
            let (pattern, repeats) = match (TriggerTime::After { delay }).to_store_trigger(None) {
                StoreTrigger::Calendar { pattern, repeats } => (pattern, repeats),
                other => panic!("expected calendar fallback, got {other:?}"),
            };
            assert!(!repeats);
            let at = pattern.to_instant().expect("fallback names a single instant");
            assert!(at >= before);
            assert!(at <= Utc::now() + Duration::seconds(1));
        }
    }

    #[test]
    fn every_enforces_one_minute_floor() {
        assert!(!TriggerTime::every(Duration::seconds(59)).is_valid());
        assert!(!TriggerTime::every(Duration::zero()).is_valid());
        assert!(TriggerTime::every(Duration::seconds(60)).is_valid());
        assert!(TriggerTime::every(Duration::hours(24)).is_valid());
    }

    #[test]
    fn past_dates_are_still_valid() {
        let past = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
        assert!(TriggerTime::at(past).is_valid());
    }

    #[test]
    fn repeating_validity_follows_pattern() {
        assert!(TriggerTime::repeating(CalendarPattern::daily_at(8, 0)).is_valid());
        assert!(!TriggerTime::repeating(CalendarPattern::default()).is_valid());
    }

    #[test]
    fn natural_repetition_per_variant() {
        let after = TriggerTime::after(Duration::seconds(10)).to_store_trigger(None);
        assert!(!after.repeats());
        assert!(!after.is_calendar());

        let every = TriggerTime::every(Duration::minutes(5)).to_store_trigger(None);
        assert!(every.repeats());

        let weekly = TriggerTime::repeating(CalendarPattern::weekly_at(Weekday::Sat, 10, 0))
            .to_store_trigger(None);
        assert!(weekly.repeats());
        assert!(weekly.is_calendar());
    }

    #[test]
    fn repeat_override_wins() {
        let trigger = TriggerTime::repeating(CalendarPattern::daily_at(6, 0))
            .to_store_trigger(Some(false));
        assert!(!trigger.repeats());
    }

    #[test]
    fn at_maps_back_from_store() {
        let at = Utc.with_ymd_and_hms(2030, 12, 24, 18, 0, 0).unwrap();
        let store = TriggerTime::at(at).to_store_trigger(None);
        assert_eq!(TriggerTime::from_store(&store), TriggerTime::at(at));
    }

    #[test]
    fn partial_non_repeating_calendar_maps_to_repeating_pattern() {
        let pattern = CalendarPattern::daily_at(7, 45);
        let store = StoreTrigger::Calendar {
            pattern: pattern.clone(),
            repeats: false,
        };
        assert_eq!(
            TriggerTime::from_store(&store),
            TriggerTime::repeating(pattern)
        );
    }

    #[test]
    fn serializes_with_kind_tag_and_millis() {
        let json = serde_json::to_value(TriggerTime::every(Duration::seconds(90))).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "every", "interval": 90_000 }));
        let back: TriggerTime = serde_json::from_value(json).unwrap();
        assert_eq!(back, TriggerTime::every(Duration::seconds(90)));
    }

    #[test]
    fn interval_next_fire_is_relative() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let trigger = TriggerTime::after(Duration::seconds(10)).to_store_trigger(None);
        assert_eq!(
            trigger.next_fire_after(from),
            Some(from + Duration::seconds(10))
        );
    }
}
