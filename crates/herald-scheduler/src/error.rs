use thiserror::Error;

use crate::store::StoreError;
use crate::types::AuthorizationStatus;

/// Every way a scheduling operation can fail. None are retried here.
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// Permission to deliver notifications was not granted.
    #[error("Notifications are not authorized (status: {status})")]
    NotAuthorized { status: AuthorizationStatus },

    /// Title empty after merging overrides.
    #[error("Notification title must not be empty")]
    InvalidTitle,

    /// Content could not be built from the supplied fields.
    #[error("Invalid notification content: {0}")]
    InvalidContent(String),

    /// The trigger failed structural validation.
    #[error("Invalid trigger time: {0}")]
    InvalidTriggerTime(String),

    /// No new trigger was supplied and the existing one cannot be reused.
    #[error("The existing trigger cannot be reused; supply a new trigger")]
    InvalidTriggerForUpdate,

    /// No pending notification carries the identifier.
    #[error("Notification not found: {id}")]
    IdentifierNotFound { id: String },

    /// Anything the notification store reported that we did not expect.
    #[error("Unexpected notification store failure: {0}")]
    Unknown(#[from] StoreError),
}

impl SchedulingError {
    /// Short error code string for hosts that map errors to their own types.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulingError::NotAuthorized { .. } => "NOT_AUTHORIZED",
            SchedulingError::InvalidTitle => "INVALID_TITLE",
            SchedulingError::InvalidContent(_) => "INVALID_CONTENT",
            SchedulingError::InvalidTriggerTime(_) => "INVALID_TRIGGER_TIME",
            SchedulingError::InvalidTriggerForUpdate => "INVALID_TRIGGER_FOR_UPDATE",
            SchedulingError::IdentifierNotFound { .. } => "IDENTIFIER_NOT_FOUND",
            SchedulingError::Unknown(_) => "UNKNOWN",
        }
    }

    /// Human-readable description, suitable for showing to the user.
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// What the user or caller can do about it, when there is something.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SchedulingError::NotAuthorized { .. } => {
                Some("Allow notifications for this app in the system settings.")
            }
            SchedulingError::InvalidTitle => Some("Provide a non-empty title."),
            SchedulingError::InvalidContent(_) => {
                Some("Check the notification fields and shrink the attached payload.")
            }
            SchedulingError::InvalidTriggerTime(_) => Some(
                "Use a positive delay, a repeat interval of at least 60 seconds, \
                 or a calendar pattern with in-range fields.",
            ),
            SchedulingError::InvalidTriggerForUpdate => {
                Some("Pass a new trigger when updating a delay- or interval-based notification.")
            }
            SchedulingError::IdentifierNotFound { .. } => {
                Some("The notification may have fired or been removed; schedule it again.")
            }
            SchedulingError::Unknown(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_are_wrapped_with_cause() {
        let err: SchedulingError = StoreError::Rejected("quota exceeded".to_string()).into();
        assert_eq!(err.code(), "UNKNOWN");
        assert!(err.description().contains("quota exceeded"));
        assert!(err.recovery_suggestion().is_none());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn not_authorized_names_status_and_suggests_settings() {
        let err = SchedulingError::NotAuthorized {
            status: AuthorizationStatus::Denied,
        };
        assert_eq!(
            err.description(),
            "Notifications are not authorized (status: denied)"
        );
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn every_local_failure_has_a_suggestion() {
        let errors = [
            SchedulingError::InvalidTitle,
            SchedulingError::InvalidContent("x".to_string()),
            SchedulingError::InvalidTriggerTime("after 0ms".to_string()),
            SchedulingError::InvalidTriggerForUpdate,
            SchedulingError::IdentifierNotFound {
                id: "a".to_string(),
            },
        ];
        for err in errors {
            assert!(err.recovery_suggestion().is_some(), "{}", err.code());
        }
    }
}
