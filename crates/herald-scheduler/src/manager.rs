use std::sync::Arc;

use herald_core::config::{HeraldConfig, SchedulingConfig};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    error::{Result, SchedulingError},
    monitor::AuthorizationMonitor,
    store::{NotificationDelegate, NotificationStore},
    trigger::TriggerTime,
    types::{
        AuthorizationStatus, NotificationDescriptor, NotificationRequest, NotificationUpdate,
        PermissionOptions, PresentationOptions, RemovalScope, RequestRef,
    },
    validate::{build_content, validate, validate_store_trigger},
};

/// Schedules, updates, and removes local notifications through a
/// [`NotificationStore`], gating every submission on authorization.
///
/// Within one `schedule`/`update` call the order is fixed: local validation,
/// then the authorization check (which may prompt), then the store mutation.
/// Invalid input therefore never triggers a permission prompt.
pub struct NotificationManager {
    store: Arc<dyn NotificationStore>,
    monitor: AuthorizationMonitor,
    scheduling: SchedulingConfig,
}

impl NotificationManager {
    /// Build a manager. Starts authorization monitoring when
    /// `config.monitor.enabled` is set, which requires a running Tokio runtime.
    pub fn new(store: Arc<dyn NotificationStore>, config: &HeraldConfig) -> Self {
        let monitor = AuthorizationMonitor::new(
            Arc::clone(&store),
            PermissionOptions::from(&config.permission),
            config.monitor.enabled,
        );
        Self {
            store,
            monitor,
            scheduling: config.scheduling.clone(),
        }
    }

    pub fn monitor(&self) -> &AuthorizationMonitor {
        &self.monitor
    }

    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.monitor.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<AuthorizationStatus> {
        self.monitor.subscribe()
    }

    pub fn set_monitoring_enabled(&self, enabled: bool) {
        self.monitor.set_monitoring_enabled(enabled);
    }

    /// Prompt for permission. Never fails: a prompt error is logged and the
    /// last known status is returned.
    pub async fn request_authorization(&self) -> AuthorizationStatus {
        self.monitor.request_authorization().await
    }

    /// Submit a new notification. Returns its identifier.
    pub async fn schedule(&self, descriptor: NotificationDescriptor) -> Result<String> {
        validate(Some(descriptor.title.as_str()), Some(&descriptor.trigger))?;
        let trigger = descriptor.trigger.to_store_trigger(descriptor.repeats);
        validate_store_trigger(&trigger)?;
        let content = build_content(
            None,
            &descriptor.content_changes(),
            self.scheduling.max_payload_bytes,
        )?;
        self.ensure_authorized().await?;

        let identifier = descriptor
            .identifier
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let request = NotificationRequest {
            identifier: identifier.clone(),
            content,
            trigger,
        };
        self.submit(request).await?;

        info!(notification_id = %identifier, trigger = %descriptor.trigger, "notification scheduled");
        Ok(identifier)
    }

    /// Change some fields of a pending notification. Returns its identifier.
    ///
    /// Without a new trigger the existing one is reused, which only works for
    /// calendar triggers: an interval trigger would restart its countdown.
    pub async fn update(
        &self,
        target: impl Into<RequestRef>,
        update: NotificationUpdate,
    ) -> Result<String> {
        validate(update.content.title.as_deref(), update.trigger.as_ref())?;
        let new_trigger = update
            .trigger
            .as_ref()
            .map(|trigger| trigger.to_store_trigger(update.repeats));
        if let Some(trigger) = &new_trigger {
            validate_store_trigger(trigger)?;
        }

        let existing = match target.into() {
            RequestRef::Request(request) => request,
            RequestRef::Identifier(id) => match self.find_pending(&id).await? {
                Some(request) => request,
                None => return Err(SchedulingError::IdentifierNotFound { id }),
            },
        };

        let content = build_content(
            Some(&existing.content),
            &update.content,
            self.scheduling.max_payload_bytes,
        )?;

        let trigger = match (new_trigger, update.repeats) {
            (Some(trigger), _) => trigger,
            (None, repeats) if existing.trigger.is_calendar() => match repeats {
                Some(repeats) => existing.trigger.with_repeats(repeats),
                None => existing.trigger.clone(),
            },
            (None, _) => {
                debug!(notification_id = %existing.identifier, "existing trigger not reusable");
                return Err(SchedulingError::InvalidTriggerForUpdate);
            }
        };

        self.ensure_authorized().await?;

        // The prompt above may have taken a while; don't resurrect a request
        // that was removed in the meantime.
        let identifier = existing.identifier;
        if self.find_pending(&identifier).await?.is_none() {
            warn!(notification_id = %identifier, "notification vanished before update");
            return Err(SchedulingError::IdentifierNotFound { id: identifier });
        }

        self.submit(NotificationRequest {
            identifier: identifier.clone(),
            content,
            trigger,
        })
        .await?;

        info!(notification_id = %identifier, "notification updated");
        Ok(identifier)
    }

    /// Replace only the trigger of a pending notification.
    pub async fn reschedule(
        &self,
        target: impl Into<RequestRef>,
        trigger: TriggerTime,
    ) -> Result<String> {
        self.update(target, NotificationUpdate::new().with_trigger(trigger))
            .await
    }

    /// Remove notifications by identifier. Absent identifiers are ignored.
    pub async fn remove<I, S>(&self, identifiers: I, scope: RemovalScope)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identifiers: Vec<String> = identifiers.into_iter().map(Into::into).collect();
        if identifiers.is_empty() {
            debug!(%scope, "remove called with no identifiers");
            return;
        }
        if scope.includes_pending() {
            self.store.remove_pending(&identifiers).await;
        }
        if scope.includes_delivered() {
            self.store.remove_delivered(&identifiers).await;
        }
        info!(count = identifiers.len(), %scope, "notifications removed");
    }

    /// Remove every notification in `scope`.
    pub async fn remove_all(&self, scope: RemovalScope) {
        if scope.includes_pending() {
            self.store.remove_all_pending().await;
        }
        if scope.includes_delivered() {
            self.store.remove_all_delivered().await;
        }
        info!(%scope, "all notifications removed");
    }

    /// Look up a pending notification. Delivered notifications are not
    /// individually queryable.
    pub async fn query(&self, identifier: &str) -> Result<Option<NotificationDescriptor>> {
        Ok(self
            .find_pending(identifier)
            .await?
            .map(|request| NotificationDescriptor::from_request(&request)))
    }

    /// Every pending notification, in store order.
    pub async fn pending(&self) -> Result<Vec<NotificationDescriptor>> {
        let requests = self.store.pending_requests().await.map_err(|e| {
            error!(error = %e, "listing pending notifications failed");
            SchedulingError::Unknown(e)
        })?;
        Ok(requests.iter().map(NotificationDescriptor::from_request).collect())
    }

    // --- private helpers ---------------------------------------------------

    /// Use the last published status, refreshing (and prompting) only while
    /// it is still undetermined.
    async fn ensure_authorized(&self) -> Result<AuthorizationStatus> {
        let mut status = self.monitor.status();
        if status == AuthorizationStatus::NotDetermined {
            status = self.monitor.authorize_if_undetermined().await;
        }
        if status.is_granted(self.scheduling.allow_provisional) {
            Ok(status)
        } else {
            warn!(%status, "notifications not authorized");
            Err(SchedulingError::NotAuthorized { status })
        }
    }

    async fn find_pending(&self, identifier: &str) -> Result<Option<NotificationRequest>> {
        let requests = self.store.pending_requests().await.map_err(|e| {
            error!(notification_id = %identifier, error = %e, "pending lookup failed");
            SchedulingError::Unknown(e)
        })?;
        Ok(requests.into_iter().find(|r| r.identifier == identifier))
    }

    async fn submit(&self, request: NotificationRequest) -> Result<()> {
        let identifier = request.identifier.clone();
        self.store.enqueue(request).await.map_err(|e| {
            error!(notification_id = %identifier, error = %e, "store rejected notification");
            SchedulingError::Unknown(e)
        })
    }
}

/// Foreground arrivals are always shown in full; nothing is suppressed.
impl NotificationDelegate for NotificationManager {
    fn will_present(&self, request: &NotificationRequest) -> PresentationOptions {
        debug!(notification_id = %request.identifier, "presenting foreground notification");
        PresentationOptions::all()
    }
}
