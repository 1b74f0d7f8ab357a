//! `herald-scheduler`: lifecycle manager for locally scheduled notifications.
//!
//! # Overview
//!
//! [`NotificationManager`] validates notifications, gates submission on the
//! user's permission (tracked by [`AuthorizationMonitor`]), and delegates the
//! actual enqueue/remove to a [`NotificationStore`] supplied by the host. The
//! store owns every pending and delivered notification; nothing is cached here.
//!
//! # Trigger variants
//!
//! | Variant     | Behaviour                                              |
//! |-------------|--------------------------------------------------------|
//! | `After`     | Fire once after a positive delay                       |
//! | `Every`     | Fire every N (≥ 60 s)                                  |
//! | `At`        | Fire once at an absolute UTC instant                   |
//! | `Repeating` | Fire whenever the wall clock matches a calendar pattern |

pub mod calendar;
pub mod error;
pub mod manager;
pub mod monitor;
pub mod store;
pub mod trigger;
pub mod types;
pub mod validate;

pub use calendar::CalendarPattern;
pub use error::{Result, SchedulingError};
pub use manager::NotificationManager;
pub use monitor::AuthorizationMonitor;
pub use store::{MemoryStore, NotificationDelegate, NotificationStore, StoreCall, StoreError};
pub use trigger::{StoreTrigger, TriggerTime};
pub use types::{
    AuthorizationStatus, ContentChanges, NotificationContent, NotificationDescriptor,
    NotificationRequest, NotificationUpdate, Payload, PermissionOptions, PresentationOptions,
    RemovalScope, RequestRef,
};
