use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    store::NotificationStore,
    types::{AuthorizationStatus, PermissionOptions},
};

/// Watches the user's notification permission and republishes it.
///
/// Idle until monitoring is enabled; while enabled, a single background task
/// polls the store once, then again on every foreground-resume signal.
/// Toggling monitoring off cancels that task between polls.
///
/// Status is published through a `watch` channel. The first value published
/// after construction is applied silently so observers don't see a spurious
/// startup transition; every later publication notifies, even when the value
/// is unchanged.
pub struct AuthorizationMonitor {
    store: Arc<dyn NotificationStore>,
    publisher: Arc<StatusPublisher>,
    enabled_tx: watch::Sender<bool>,
    watcher: Mutex<Option<Watcher>>,
    /// Held for the duration of a permission prompt.
    prompt: tokio::sync::Mutex<()>,
    options: PermissionOptions,
}

struct Watcher {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl AuthorizationMonitor {
    /// Build a monitor. When `enabled` is true the watcher starts right away,
    /// which requires a running Tokio runtime.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        options: PermissionOptions,
        enabled: bool,
    ) -> Self {
        let (enabled_tx, _) = watch::channel(enabled);
        let monitor = Self {
            store,
            publisher: Arc::new(StatusPublisher::new()),
            enabled_tx,
            watcher: Mutex::new(None),
            prompt: tokio::sync::Mutex::new(()),
            options,
        };
        if enabled {
            monitor.start_watching();
        }
        monitor
    }

    /// Last published status.
    pub fn status(&self) -> AuthorizationStatus {
        *self.publisher.tx.borrow()
    }

    /// Observe status transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthorizationStatus> {
        self.publisher.tx.subscribe()
    }

    pub fn monitoring_enabled(&self) -> bool {
        *self.enabled_tx.borrow()
    }

    /// Observe the monitoring flag.
    pub fn subscribe_monitoring(&self) -> watch::Receiver<bool> {
        self.enabled_tx.subscribe()
    }

    /// True while a watcher task is alive.
    pub fn is_watching(&self) -> bool {
        self.watcher_slot()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Start or stop the watcher.
    ///
    /// Enabling always replaces any running watcher, so rapid toggling never
    /// leaves two loops polling at once.
    pub fn set_monitoring_enabled(&self, enabled: bool) {
        self.enabled_tx.send_replace(enabled);
        if enabled {
            self.start_watching();
        } else {
            self.stop_watching();
        }
    }

    /// Poll the store once and publish the result.
    pub async fn refresh(&self) -> AuthorizationStatus {
        poll(self.store.as_ref(), &self.publisher).await
    }

    /// Show the permission prompt.
    ///
    /// A failed prompt is logged and leaves the published status untouched.
    pub async fn request_authorization(&self) -> AuthorizationStatus {
        let _prompt = self.prompt.lock().await;
        self.prompt_locked().await
    }

    /// Prompt only if the store still reports `NotDetermined`.
    ///
    /// Concurrent callers queue on the prompt lock; whoever gets it after the
    /// first prompt completes sees the decided status and skips prompting.
    pub async fn authorize_if_undetermined(&self) -> AuthorizationStatus {
        let _prompt = self.prompt.lock().await;
        let status = self.refresh().await;
        if status != AuthorizationStatus::NotDetermined {
            return status;
        }
        self.prompt_locked().await
    }

    // --- private helpers ---------------------------------------------------

    async fn prompt_locked(&self) -> AuthorizationStatus {
        match self.store.request_permission(self.options.clone()).await {
            Ok(granted) => {
                info!(granted, "permission prompt completed");
                self.refresh().await
            }
            Err(e) => {
                warn!(error = %e, "permission request failed; keeping last known status");
                self.status()
            }
        }
    }

    fn start_watching(&self) {
        let mut slot = self.watcher_slot();
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        // Subscribe before spawning so no resume signal slips in between.
        let resumed = self.store.foreground_resumed();
        let handle = tokio::spawn(watch_loop(
            Arc::clone(&self.store),
            Arc::clone(&self.publisher),
            cancel.clone(),
            resumed,
        ));
        *slot = Some(Watcher { cancel, handle });
        info!("authorization monitoring started");
    }

    fn stop_watching(&self) {
        if let Some(watcher) = self.watcher_slot().take() {
            watcher.cancel.cancel();
            info!("authorization monitoring stopped");
        }
    }

    fn watcher_slot(&self) -> std::sync::MutexGuard<'_, Option<Watcher>> {
        self.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AuthorizationMonitor {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

/// Single writer for the published status.
struct StatusPublisher {
    tx: watch::Sender<AuthorizationStatus>,
    /// False until the first publication; guards the cold-start rule.
    published: Mutex<bool>,
}

impl StatusPublisher {
    fn new() -> Self {
        let (tx, _) = watch::channel(AuthorizationStatus::NotDetermined);
        Self {
            tx,
            published: Mutex::new(false),
        }
    }

    fn publish(&self, status: AuthorizationStatus) {
        let mut published = self.published.lock().unwrap_or_else(PoisonError::into_inner);
        if !*published {
            *published = true;
            self.tx.send_if_modified(|current| {
                *current = status;
                false
            });
            debug!(%status, "initial authorization status applied");
            return;
        }

        let previous = self.tx.send_replace(status);
        if previous != status {
            info!(from = %previous, to = %status, "authorization status changed");
        } else {
            debug!(%status, "authorization status republished");
        }
    }
}

async fn poll(store: &dyn NotificationStore, publisher: &StatusPublisher) -> AuthorizationStatus {
    let status = store.permission_status().await;
    publisher.publish(status);
    status
}

/// Poll once, then once per foreground resume, until cancelled.
async fn watch_loop(
    store: Arc<dyn NotificationStore>,
    publisher: Arc<StatusPublisher>,
    cancel: CancellationToken,
    mut resumed: broadcast::Receiver<()>,
) {
    if cancel.is_cancelled() {
        return;
    }
    poll(store.as_ref(), &publisher).await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            signal = resumed.recv() => match signal {
                Ok(()) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "coalescing missed foreground signals");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("foreground signal closed; authorization watcher exiting");
                    break;
                }
            },
        }
        poll(store.as_ref(), &publisher).await;
    }
    debug!("authorization watcher exited");
}
