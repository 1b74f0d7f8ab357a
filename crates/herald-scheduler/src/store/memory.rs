use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::{NotificationDelegate, NotificationStore, StoreError};
use crate::types::{
    AuthorizationStatus, NotificationRequest, PermissionOptions, PresentationOptions,
};

const RESUME_CAPACITY: usize = 16;

/// One recorded call into a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    RequestPermission,
    PermissionStatus,
    Enqueue(String),
    PendingRequests,
    RemoveDelivered(Vec<String>),
    RemovePending(Vec<String>),
    RemoveAllDelivered,
    RemoveAllPending,
}

/// In-process notification store.
///
/// Stands in for the platform service in hosts without one (and in tests):
/// keeps pending/delivered sets in memory, simulates the permission prompt,
/// and records every call so callers can assert on the exact sequence.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    resume_tx: broadcast::Sender<()>,
    delegate: RwLock<Option<Weak<dyn NotificationDelegate>>>,
}

struct MemoryState {
    status: AuthorizationStatus,
    /// Outcome of the simulated prompt while status is `NotDetermined`.
    grant_on_request: bool,
    permission_failure: Option<String>,
    enqueue_failure: Option<String>,
    pending: Vec<NotificationRequest>,
    delivered: Vec<NotificationRequest>,
    calls: Vec<StoreCall>,
}

impl MemoryStore {
    /// A store whose user grants permission when prompted.
    pub fn new(status: AuthorizationStatus) -> Self {
        let (resume_tx, _) = broadcast::channel(RESUME_CAPACITY);
        Self {
            state: Mutex::new(MemoryState {
                status,
                grant_on_request: true,
                permission_failure: None,
                enqueue_failure: None,
                pending: Vec::new(),
                delivered: Vec::new(),
                calls: Vec::new(),
            }),
            resume_tx,
            delegate: RwLock::new(None),
        }
    }

    /// Choose what the simulated user answers to the prompt.
    pub fn granting(self, grant: bool) -> Self {
        self.state().grant_on_request = grant;
        self
    }

    /// Change the permission status, as if the user edited system settings.
    pub fn set_status(&self, status: AuthorizationStatus) {
        self.state().status = status;
    }

    /// Make every permission prompt fail until cleared with `None`.
    pub fn fail_permission_requests(&self, reason: Option<&str>) {
        self.state().permission_failure = reason.map(String::from);
    }

    /// Make the next `enqueue` fail.
    pub fn fail_next_enqueue(&self, reason: &str) {
        self.state().enqueue_failure = Some(reason.to_string());
    }

    /// Signal that the host app came back to the foreground.
    pub fn resume_foreground(&self) {
        // no subscribers just means nobody is watching
        let _ = self.resume_tx.send(());
    }

    /// Register the foreground-presentation delegate. Held weakly.
    pub fn set_delegate<D: NotificationDelegate + 'static>(&self, delegate: &Arc<D>) {
        let weak = Arc::downgrade(delegate) as Weak<dyn NotificationDelegate>;
        *self
            .delegate
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(weak);
    }

    /// Fire a pending notification while the app is in the foreground.
    ///
    /// Non-repeating requests leave the pending set. Returns how the delegate
    /// asked for it to be presented, or `None` when the identifier is not
    /// pending or no delegate is registered.
    pub fn deliver(&self, identifier: &str) -> Option<PresentationOptions> {
        let request = {
            let mut state = self.state();
            let index = state
                .pending
                .iter()
                .position(|r| r.identifier == identifier)?;
            let request = if state.pending[index].trigger.repeats() {
                state.pending[index].clone()
            } else {
                state.pending.remove(index)
            };
            state.delivered.retain(|r| r.identifier != identifier);
            state.delivered.push(request.clone());
            request
        };
        debug!(notification_id = %identifier, "notification delivered");

        let delegate = self
            .delegate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)?;
        Some(delegate.will_present(&request))
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.state()
            .pending
            .iter()
            .map(|r| r.identifier.clone())
            .collect()
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.state()
            .delivered
            .iter()
            .map(|r| r.identifier.clone())
            .collect()
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: StoreCall) -> MutexGuard<'_, MemoryState> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(AuthorizationStatus::NotDetermined)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn request_permission(&self, options: PermissionOptions) -> Result<bool, StoreError> {
        let mut state = self.record(StoreCall::RequestPermission);
        if let Some(reason) = &state.permission_failure {
            return Err(StoreError::Permission(reason.clone()));
        }
        if state.status == AuthorizationStatus::NotDetermined {
            state.status = match (state.grant_on_request, options.provisional) {
                (true, true) => AuthorizationStatus::Provisional,
                (true, false) => AuthorizationStatus::Authorized,
                (false, _) => AuthorizationStatus::Denied,
            };
        }
        Ok(matches!(
            state.status,
            AuthorizationStatus::Authorized
                | AuthorizationStatus::Provisional
                | AuthorizationStatus::Ephemeral
        ))
    }

    async fn permission_status(&self) -> AuthorizationStatus {
        self.record(StoreCall::PermissionStatus).status
    }

    async fn enqueue(&self, request: NotificationRequest) -> Result<(), StoreError> {
        let mut state = self.record(StoreCall::Enqueue(request.identifier.clone()));
        if let Some(reason) = state.enqueue_failure.take() {
            return Err(StoreError::Rejected(reason));
        }
        match state
            .pending
            .iter_mut()
            .find(|r| r.identifier == request.identifier)
        {
            Some(existing) => *existing = request,
            None => state.pending.push(request),
        }
        Ok(())
    }

    async fn pending_requests(&self) -> Result<Vec<NotificationRequest>, StoreError> {
        Ok(self.record(StoreCall::PendingRequests).pending.clone())
    }

    async fn remove_delivered(&self, identifiers: &[String]) {
        let mut state = self.record(StoreCall::RemoveDelivered(identifiers.to_vec()));
        state
            .delivered
            .retain(|r| !identifiers.contains(&r.identifier));
    }

    async fn remove_pending(&self, identifiers: &[String]) {
        let mut state = self.record(StoreCall::RemovePending(identifiers.to_vec()));
        state.pending.retain(|r| !identifiers.contains(&r.identifier));
    }

    async fn remove_all_delivered(&self) {
        self.record(StoreCall::RemoveAllDelivered).delivered.clear();
    }

    async fn remove_all_pending(&self) {
        self.record(StoreCall::RemoveAllPending).pending.clear();
    }

    fn foreground_resumed(&self) -> broadcast::Receiver<()> {
        self.resume_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::trigger::TriggerTime;
    use crate::types::NotificationContent;

    fn request(id: &str, title: &str, trigger: TriggerTime) -> NotificationRequest {
        NotificationRequest {
            identifier: id.to_string(),
            content: NotificationContent {
                title: title.to_string(),
                ..NotificationContent::default()
            },
            trigger: trigger.to_store_trigger(None),
        }
    }

    struct AlwaysPresent;

    impl NotificationDelegate for AlwaysPresent {
        fn will_present(&self, _request: &NotificationRequest) -> PresentationOptions {
            PresentationOptions::all()
        }
    }

    #[tokio::test]
    async fn enqueue_with_same_identifier_replaces() {
        let store = MemoryStore::new(AuthorizationStatus::Authorized);
        let trigger = TriggerTime::after(Duration::seconds(5));
        store.enqueue(request("a", "first", trigger.clone())).await.unwrap();
        store.enqueue(request("a", "second", trigger)).await.unwrap();

        let pending = store.pending_requests().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].content.title, "second");
    }

    #[tokio::test]
    async fn prompt_only_changes_undetermined_status() {
        let store = MemoryStore::new(AuthorizationStatus::NotDetermined).granting(false);
        assert!(!store.request_permission(PermissionOptions::default()).await.unwrap());
        assert_eq!(store.permission_status().await, AuthorizationStatus::Denied);

        store.set_status(AuthorizationStatus::Authorized);
        assert!(store.request_permission(PermissionOptions::default()).await.unwrap());
    }

    #[tokio::test]
    async fn injected_enqueue_failure_fires_once() {
        let store = MemoryStore::new(AuthorizationStatus::Authorized);
        store.fail_next_enqueue("disk full");
        let trigger = TriggerTime::now();
        assert!(store.enqueue(request("a", "t", trigger.clone())).await.is_err());
        assert!(store.enqueue(request("a", "t", trigger)).await.is_ok());
    }

    #[tokio::test]
    async fn deliver_moves_one_shot_and_consults_delegate() {
        let store = MemoryStore::new(AuthorizationStatus::Authorized);
        store
            .enqueue(request("once", "t", TriggerTime::now()))
            .await
            .unwrap();
        store
            .enqueue(request("loop", "t", TriggerTime::every(Duration::minutes(1))))
            .await
            .unwrap();

        // no delegate registered yet
        assert_eq!(store.deliver("once"), None);
        assert_eq!(store.pending_ids(), vec!["loop".to_string()]);
        assert_eq!(store.delivered_ids(), vec!["once".to_string()]);

        let delegate = Arc::new(AlwaysPresent);
        store.set_delegate(&delegate);
        assert_eq!(store.deliver("loop"), Some(PresentationOptions::all()));
        // repeating requests stay pending
        assert_eq!(store.pending_ids(), vec!["loop".to_string()]);
        assert_eq!(store.deliver("missing"), None);
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let store = MemoryStore::default();
        store.permission_status().await;
        store.remove_pending(&["x".to_string()]).await;
        store.remove_all_delivered().await;
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::PermissionStatus,
                StoreCall::RemovePending(vec!["x".to_string()]),
                StoreCall::RemoveAllDelivered,
            ]
        );
    }
}
