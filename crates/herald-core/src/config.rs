use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4 * 1024; // platform payload cap for local notifications
pub const ENV_PREFIX: &str = "HERALD_";

/// Top-level config (herald.toml + HERALD_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub permission: PermissionConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
}

/// Authorization monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Start watching permission status as soon as the manager is built.
    /// Override with env var: HERALD_MONITOR__ENABLED=false
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Which capabilities to ask for when the permission prompt is shown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    #[serde(default = "bool_true")]
    pub alert: bool,
    #[serde(default = "bool_true")]
    pub badge: bool,
    #[serde(default = "bool_true")]
    pub sound: bool,
    /// Ask for quiet (provisional) delivery instead of an interruptive prompt.
    #[serde(default)]
    pub provisional: bool,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            alert: true,
            badge: true,
            sound: true,
            provisional: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// When true, `provisional` and `ephemeral` grants are enough to schedule.
    #[serde(default)]
    pub allow_provisional: bool,
    /// Upper bound on the JSON-encoded payload attached to a notification.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            allow_provisional: false,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

fn bool_true() -> bool {
    true
}

fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

impl HeraldConfig {
    /// Load config from a TOML file with HERALD_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.herald/herald.toml
    ///
    /// A missing file is not an error: every section has defaults.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(path = %path, "loading config");

        Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Extract a config from an already assembled figment.
    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        figment
            .extract()
            .map_err(|e| crate::error::HeraldError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.herald/herald.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_figment_yields_defaults() {
        let config = HeraldConfig::from_figment(Figment::new()).expect("extract failed");
        assert!(config.monitor.enabled);
        assert!(config.permission.alert);
        assert!(!config.permission.provisional);
        assert!(!config.scheduling.allow_provisional);
        assert_eq!(config.scheduling.max_payload_bytes, DEFAULT_MAX_PAYLOAD_BYTES);
    }

    #[test]
    fn toml_overrides_individual_fields() {
        let toml = r#"
            [monitor]
            enabled = false

            [scheduling]
            allow_provisional = true
        "#;
        let config = HeraldConfig::from_figment(Figment::new().merge(Toml::string(toml)))
            .expect("extract failed");
        assert!(!config.monitor.enabled);
        assert!(config.scheduling.allow_provisional);
        // untouched fields keep their defaults
        assert_eq!(config.scheduling.max_payload_bytes, DEFAULT_MAX_PAYLOAD_BYTES);
        assert!(config.permission.sound);
    }

    #[test]
    fn wrong_type_is_config_error() {
        let toml = r#"
            [scheduling]
            max_payload_bytes = "lots"
        "#;
        let err = HeraldConfig::from_figment(Figment::new().merge(Toml::string(toml)))
            .expect_err("should fail");
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
