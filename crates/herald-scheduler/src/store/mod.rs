//! Boundary to the platform notification store.
//!
//! The store owns every pending and delivered notification; this crate keeps
//! no copy and asks it fresh on every read.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::types::{
    AuthorizationStatus, NotificationRequest, PermissionOptions, PresentationOptions,
};

pub use memory::{MemoryStore, StoreCall};

/// Failures reported by a notification store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused the request (quota, malformed trigger, …).
    #[error("Store rejected the request: {0}")]
    Rejected(String),

    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The permission prompt could not be shown or completed.
    #[error("Permission request failed: {0}")]
    Permission(String),
}

/// Platform notification service, as seen from the lifecycle manager.
///
/// Implementations serialize their own operations; callers never hold a lock
/// across two calls, so a read followed by a write is not atomic.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Show the permission prompt. Returns whether permission was granted.
    async fn request_permission(&self, options: PermissionOptions) -> Result<bool, StoreError>;

    async fn permission_status(&self) -> AuthorizationStatus;

    /// Add a request. A request with an existing identifier replaces it.
    async fn enqueue(&self, request: NotificationRequest) -> Result<(), StoreError>;

    async fn pending_requests(&self) -> Result<Vec<NotificationRequest>, StoreError>;

    /// Unknown identifiers are ignored.
    async fn remove_delivered(&self, identifiers: &[String]);

    /// Unknown identifiers are ignored.
    async fn remove_pending(&self, identifiers: &[String]);

    async fn remove_all_delivered(&self);

    async fn remove_all_pending(&self);

    /// Fires each time the host app returns to the foreground.
    fn foreground_resumed(&self) -> broadcast::Receiver<()>;
}

/// Called by the store when a notification arrives while the app is in the
/// foreground.
pub trait NotificationDelegate: Send + Sync {
    fn will_present(&self, request: &NotificationRequest) -> PresentationOptions;
}
