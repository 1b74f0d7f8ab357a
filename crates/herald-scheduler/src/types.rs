use std::fmt;

use herald_core::config::PermissionConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::trigger::{StoreTrigger, TriggerTime};

/// Opaque key-value data attached to a notification.
pub type Payload = Map<String, Value>;

/// Whether the user lets this app deliver notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
    Denied,
    Authorized,
    /// Quiet delivery granted without an explicit prompt.
    Provisional,
    /// Time-limited grant for app clips and similar short-lived hosts.
    Ephemeral,
    /// A status code this build does not know about.
    Unknown(i64),
}

impl AuthorizationStatus {
    /// Map a platform status code. Codes outside 0..=4 are kept as `Unknown`.
    pub fn from_raw(code: i64) -> Self {
        match code {
            0 => AuthorizationStatus::NotDetermined,
            1 => AuthorizationStatus::Denied,
            2 => AuthorizationStatus::Authorized,
            3 => AuthorizationStatus::Provisional,
            4 => AuthorizationStatus::Ephemeral,
            other => AuthorizationStatus::Unknown(other),
        }
    }

    pub fn raw(&self) -> i64 {
        match self {
            AuthorizationStatus::NotDetermined => 0,
            AuthorizationStatus::Denied => 1,
            AuthorizationStatus::Authorized => 2,
            AuthorizationStatus::Provisional => 3,
            AuthorizationStatus::Ephemeral => 4,
            AuthorizationStatus::Unknown(code) => *code,
        }
    }

    /// True when scheduling may proceed. Provisional and ephemeral grants only
    /// count when `allow_provisional` is set.
    pub fn is_granted(&self, allow_provisional: bool) -> bool {
        match self {
            AuthorizationStatus::Authorized => true,
            AuthorizationStatus::Provisional | AuthorizationStatus::Ephemeral => allow_provisional,
            _ => false,
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationStatus::NotDetermined => write!(f, "not_determined"),
            AuthorizationStatus::Denied => write!(f, "denied"),
            AuthorizationStatus::Authorized => write!(f, "authorized"),
            AuthorizationStatus::Provisional => write!(f, "provisional"),
            AuthorizationStatus::Ephemeral => write!(f, "ephemeral"),
            AuthorizationStatus::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// Which notification set a removal acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalScope {
    Delivered,
    Pending,
    Both,
}

impl RemovalScope {
    pub fn includes_pending(&self) -> bool {
        matches!(self, RemovalScope::Pending | RemovalScope::Both)
    }

    pub fn includes_delivered(&self) -> bool {
        matches!(self, RemovalScope::Delivered | RemovalScope::Both)
    }
}

impl fmt::Display for RemovalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemovalScope::Delivered => "delivered",
            RemovalScope::Pending => "pending",
            RemovalScope::Both => "both",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RemovalScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "delivered" => Ok(RemovalScope::Delivered),
            "pending" => Ok(RemovalScope::Pending),
            "both" => Ok(RemovalScope::Both),
            other => Err(format!("unknown removal scope: {other}")),
        }
    }
}

/// Capabilities requested from the permission prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOptions {
    pub alert: bool,
    pub badge: bool,
    pub sound: bool,
    pub provisional: bool,
}

impl Default for PermissionOptions {
    fn default() -> Self {
        Self::from(&PermissionConfig::default())
    }
}

impl From<&PermissionConfig> for PermissionOptions {
    fn from(config: &PermissionConfig) -> Self {
        Self {
            alert: config.alert,
            badge: config.badge,
            sound: config.sound,
            provisional: config.provisional,
        }
    }
}

/// How a notification arriving in the foreground is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationOptions {
    pub badge: bool,
    pub sound: bool,
    pub banner: bool,
    pub list: bool,
}

impl PresentationOptions {
    pub fn all() -> Self {
        Self {
            badge: true,
            sound: true,
            banner: true,
            list: true,
        }
    }
}

/// What the user sees. Stored inside a [`NotificationRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// No sound when delivered.
    #[serde(default)]
    pub silenced: bool,
    /// App icon badge number to set on delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    /// Groups related notifications in the notification list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub payload: Payload,
}

/// Field overrides merged onto a [`NotificationContent`]. `None` keeps the
/// current value; an empty string clears an optional text field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentChanges {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub body: Option<String>,
    pub silenced: Option<bool>,
    pub badge: Option<u32>,
    pub thread_id: Option<String>,
    pub payload: Option<Payload>,
}

/// A request as held by the platform store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub identifier: String,
    pub content: NotificationContent,
    pub trigger: StoreTrigger,
}

/// Caller-facing description of a notification to schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDescriptor {
    /// Generated (UUID v4) when absent or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub silenced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub payload: Payload,
    pub trigger: TriggerTime,
    /// Overrides the trigger's natural repetition when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeats: Option<bool>,
}

impl NotificationDescriptor {
    pub fn new(title: impl Into<String>, trigger: TriggerTime) -> Self {
        Self {
            identifier: None,
            title: title.into(),
            subtitle: None,
            body: None,
            silenced: false,
            badge: None,
            thread_id: None,
            payload: Payload::new(),
            trigger,
            repeats: None,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn silenced(mut self, silenced: bool) -> Self {
        self.silenced = silenced;
        self
    }

    pub fn with_badge(mut self, badge: u32) -> Self {
        self.badge = Some(badge);
        self
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_payload_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    pub fn repeats(mut self, repeats: bool) -> Self {
        self.repeats = Some(repeats);
        self
    }

    /// Every content field as an override, for building fresh content.
    pub fn content_changes(&self) -> ContentChanges {
        ContentChanges {
            title: Some(self.title.clone()),
            subtitle: self.subtitle.clone(),
            body: self.body.clone(),
            silenced: Some(self.silenced),
            badge: self.badge,
            thread_id: self.thread_id.clone(),
            payload: Some(self.payload.clone()),
        }
    }

    /// Describe a request read back from the store.
    pub fn from_request(request: &NotificationRequest) -> Self {
        let trigger = TriggerTime::from_store(&request.trigger);
        let repeats = request.trigger.repeats();
        let content = &request.content;
        Self {
            identifier: Some(request.identifier.clone()),
            title: content.title.clone(),
            subtitle: content.subtitle.clone(),
            body: content.body.clone(),
            silenced: content.silenced,
            badge: content.badge,
            thread_id: content.thread_id.clone(),
            payload: content.payload.clone(),
            repeats: (repeats != trigger.repeats_by_default()).then_some(repeats),
            trigger,
        }
    }
}

/// Partial changes applied by `update`. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationUpdate {
    pub content: ContentChanges,
    pub trigger: Option<TriggerTime>,
    pub repeats: Option<bool>,
}

impl NotificationUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.content.title = Some(title.into());
        self
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.content.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.content.body = Some(body.into());
        self
    }

    pub fn silenced(mut self, silenced: bool) -> Self {
        self.content.silenced = Some(silenced);
        self
    }

    pub fn with_badge(mut self, badge: u32) -> Self {
        self.content.badge = Some(badge);
        self
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.content.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.content.payload = Some(payload);
        self
    }

    pub fn with_trigger(mut self, trigger: TriggerTime) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn repeats(mut self, repeats: bool) -> Self {
        self.repeats = Some(repeats);
        self
    }
}

/// Target of `update`/`reschedule`: an identifier to look up, or a request
/// the caller already holds.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestRef {
    Identifier(String),
    Request(NotificationRequest),
}

impl RequestRef {
    pub fn identifier(&self) -> &str {
        match self {
            RequestRef::Identifier(id) => id,
            RequestRef::Request(request) => &request.identifier,
        }
    }
}

impl From<&str> for RequestRef {
    fn from(id: &str) -> Self {
        RequestRef::Identifier(id.to_string())
    }
}

impl From<String> for RequestRef {
    fn from(id: String) -> Self {
        RequestRef::Identifier(id)
    }
}

impl From<&String> for RequestRef {
    fn from(id: &String) -> Self {
        RequestRef::Identifier(id.clone())
    }
}

impl From<NotificationRequest> for RequestRef {
    fn from(request: NotificationRequest) -> Self {
        RequestRef::Request(request)
    }
}
