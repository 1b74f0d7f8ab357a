//! Local checks run before any call into the notification store.

use crate::{
    error::{Result, SchedulingError},
    trigger::{min_repeat_interval, StoreTrigger, TriggerTime},
    types::{ContentChanges, NotificationContent},
};

/// Check the fields a caller intends to set. `None` skips that check.
pub fn validate(title: Option<&str>, trigger: Option<&TriggerTime>) -> Result<()> {
    if title.is_some_and(is_blank) {
        return Err(SchedulingError::InvalidTitle);
    }
    if let Some(trigger) = trigger {
        if !trigger.is_valid() {
            return Err(SchedulingError::InvalidTriggerTime(trigger.to_string()));
        }
    }
    Ok(())
}

/// Check the trigger a request will actually carry once any repeat override
/// is applied. A one-shot delay forced to repeat must meet the repeat floor.
pub fn validate_store_trigger(trigger: &StoreTrigger) -> Result<()> {
    match trigger {
        StoreTrigger::TimeInterval {
            interval,
            repeats: true,
        } if *interval < min_repeat_interval() => {
            Err(SchedulingError::InvalidTriggerTime(format!(
                "repeating interval of {}ms is below the {}s minimum",
                interval.num_milliseconds(),
                min_repeat_interval().num_seconds()
            )))
        }
        _ => Ok(()),
    }
}

/// Merge `changes` onto `base` (or empty content).
///
/// The merged title must be non-empty even when `changes` leaves it alone,
/// and the encoded payload must fit in `max_payload_bytes`.
pub fn build_content(
    base: Option<&NotificationContent>,
    changes: &ContentChanges,
    max_payload_bytes: usize,
) -> Result<NotificationContent> {
    let mut content = base.cloned().unwrap_or_default();

    if let Some(title) = &changes.title {
        content.title = title.clone();
    }
    if let Some(subtitle) = &changes.subtitle {
        content.subtitle = non_empty(subtitle);
    }
    if let Some(body) = &changes.body {
        content.body = non_empty(body);
    }
    if let Some(silenced) = changes.silenced {
        content.silenced = silenced;
    }
    if let Some(badge) = changes.badge {
        content.badge = Some(badge);
    }
    if let Some(thread_id) = &changes.thread_id {
        content.thread_id = non_empty(thread_id);
    }
    if let Some(payload) = &changes.payload {
        content.payload = payload.clone();
    }

    if is_blank(&content.title) {
        return Err(SchedulingError::InvalidTitle);
    }

    let size = serde_json::to_vec(&content.payload)
        .map_err(|e| SchedulingError::InvalidContent(e.to_string()))?
        .len();
    if size > max_payload_bytes {
        return Err(SchedulingError::InvalidContent(format!(
            "payload is {size} bytes (max {max_payload_bytes})"
        )));
    }

    Ok(content)
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
