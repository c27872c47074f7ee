//! Shared configuration for the ledweave CLI and TUI.
//!
//! TOML config file, environment overrides, access-token resolution,
//! and live [`Preferences`] handles that push changes to running
//! sessions. Both binaries depend on this crate.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Environment variable holding the access token, checked before the
/// config file.
pub const ACCESS_TOKEN_ENV: &str = "LEDWEAVE_ACCESS_TOKEN";

/// Default name of the device to track, matching what the flasher
/// firmware registers itself as.
pub const DEFAULT_DEVICE_NAME: &str = "ledflasher";

const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no access token configured (set {ACCESS_TOKEN_ENV} or cloud.access_token)")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration shared by CLI and TUI.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Name of the device to track for LED control.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Whether the user accepted the cloud terms of service. Network
    /// commands refuse to run until this is true.
    #[serde(default)]
    pub tos_accepted: bool,

    #[serde(default)]
    pub cloud: CloudSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            tos_accepted: false,
            cloud: CloudSettings::default(),
        }
    }
}

/// Cloud connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudSettings {
    /// Cloud base URL. The `/weave/v1/` base path is appended
    /// automatically when missing.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Access token (plaintext — prefer the environment variable).
    pub access_token: Option<String>,

    /// Device list poll interval.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Run against the built-in simulated cloud instead of the network.
    #[serde(default)]
    pub simulate: bool,
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            access_token: None,
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_timeout(),
            simulate: false,
        }
    }
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.into()
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}
fn default_poll_interval() -> u64 {
    5
}
fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Validate field values that serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let _: url::Url = self
            .cloud
            .endpoint
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "cloud.endpoint".into(),
                reason: format!("invalid URL: {}", self.cloud.endpoint),
            })?;

        if self.device_name.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "device_name".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "ledweave", "ledweave").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ledweave");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Provider stack: defaults, then the TOML file, then `LEDWEAVE_*`
/// environment variables (`__` separates nesting, so
/// `LEDWEAVE_CLOUD__ENDPOINT` maps to `cloud.endpoint` while
/// `LEDWEAVE_DEVICE_NAME` stays one key).
fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LEDWEAVE_").split("__"))
}

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from a specific file + environment.
///
/// A missing file is not an error; defaults and environment variables
/// still apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    Ok(config)
}

/// Load only defaults + the TOML file, without environment overlays.
///
/// Read-modify-write flows use this so ambient environment variables
/// don't end up baked into the saved file.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or fails
/// to parse.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

// ── Access token resolution ─────────────────────────────────────────

/// Resolve the access token: environment variable first, then the
/// plaintext config entry.
pub fn resolve_access_token(config: &Config) -> Result<SecretString, ConfigError> {
    if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
        if !token.is_empty() {
            return Ok(SecretString::from(token));
        }
    }

    if let Some(ref token) = config.cloud.access_token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials)
}

// ── Live preferences ─────────────────────────────────────────────────

/// Settings that running sessions observe live.
///
/// Wraps the mutable subset of [`Config`] in `watch` channels. Setters
/// only notify when the value actually changes, so a no-op write does
/// not restart discovery. Persisting back to disk is the caller's
/// business via [`save_config`].
pub struct Preferences {
    device_name: watch::Sender<String>,
    tos_accepted: watch::Sender<bool>,
}

impl Preferences {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let (device_name, _) = watch::channel(config.device_name.clone());
        let (tos_accepted, _) = watch::channel(config.tos_accepted);
        Self {
            device_name,
            tos_accepted,
        }
    }

    /// Subscribe to target device name changes.
    #[must_use]
    pub fn device_name(&self) -> watch::Receiver<String> {
        self.device_name.subscribe()
    }

    #[must_use]
    pub fn current_device_name(&self) -> String {
        self.device_name.borrow().clone()
    }

    pub fn set_device_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.device_name.send_if_modified(|current| {
            if *current == name {
                false
            } else {
                *current = name;
                true
            }
        });
    }

    #[must_use]
    pub fn tos_accepted(&self) -> watch::Receiver<bool> {
        self.tos_accepted.subscribe()
    }

    #[must_use]
    pub fn is_tos_accepted(&self) -> bool {
        *self.tos_accepted.borrow()
    }

    pub fn set_tos_accepted(&self, accepted: bool) {
        self.tos_accepted.send_if_modified(|current| {
            if *current == accepted {
                false
            } else {
                *current = accepted;
                true
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn jail_config() -> Result<Config, figment::Error> {
        figment_for(Path::new("ledweave.toml")).extract()
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        figment::Jail::expect_with(|_jail| {
            let config = jail_config()?;
            assert_eq!(config.device_name, "ledflasher");
            assert!(!config.tos_accepted);
            assert_eq!(config.cloud.endpoint, DEFAULT_ENDPOINT);
            assert_eq!(config.cloud.poll_interval_secs, 5);
            assert_eq!(config.cloud.timeout_secs, 30);
            assert!(!config.cloud.simulate);
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn toml_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "ledweave.toml",
                r#"
                    device_name = "workbench flasher"
                    tos_accepted = true

                    [cloud]
                    endpoint = "https://weave.example.net"
                    poll_interval_secs = 2
                "#,
            )?;

            let config = jail_config()?;
            assert_eq!(config.device_name, "workbench flasher");
            assert!(config.tos_accepted);
            assert_eq!(config.cloud.endpoint, "https://weave.example.net");
            assert_eq!(config.cloud.poll_interval_secs, 2);
            // Unset keys keep their defaults.
            assert_eq!(config.cloud.timeout_secs, 30);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("ledweave.toml", r#"device_name = "from the file""#)?;
            jail.set_env("LEDWEAVE_DEVICE_NAME", "from the env");
            jail.set_env("LEDWEAVE_CLOUD__SIMULATE", "true");

            let config = jail_config()?;
            assert_eq!(config.device_name, "from the env");
            assert!(config.cloud.simulate);
            Ok(())
        });
    }

    #[test]
    fn validate_rejects_bad_values() {
        let config = Config {
            cloud: CloudSettings {
                endpoint: "not a url".into(),
                ..CloudSettings::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { field, .. }) if field == "cloud.endpoint"
        ));

        let config = Config {
            device_name: "  ".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { field, .. }) if field == "device_name"
        ));
    }

    #[test]
    fn access_token_prefers_env_over_file() {
        figment::Jail::expect_with(|jail| {
            let config = Config {
                cloud: CloudSettings {
                    access_token: Some("from-file".into()),
                    ..CloudSettings::default()
                },
                ..Config::default()
            };

            jail.set_env(ACCESS_TOKEN_ENV, "from-env");
            let token = resolve_access_token(&config).unwrap();
            assert_eq!(secrecy::ExposeSecret::expose_secret(&token), "from-env");
            Ok(())
        });
    }

    #[test]
    fn access_token_missing_everywhere_is_an_error() {
        // Inside a jail to serialize with the env-setting tests.
        figment::Jail::expect_with(|_jail| {
            let config = Config::default();
            assert!(matches!(
                resolve_access_token(&config),
                Err(ConfigError::NoCredentials)
            ));
            Ok(())
        });
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            device_name: "garage flasher".into(),
            tos_accepted: true,
            cloud: CloudSettings {
                access_token: Some("tok".into()),
                ..CloudSettings::default()
            },
        };

        save_config_to(&path, &config).unwrap();

        let reloaded: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .extract()
            .unwrap();
        assert_eq!(reloaded.device_name, "garage flasher");
        assert!(reloaded.tos_accepted);
        assert_eq!(reloaded.cloud.access_token.as_deref(), Some("tok"));
    }

    #[test]
    fn preferences_notify_only_on_real_changes() {
        let prefs = Preferences::new(&Config::default());
        let mut names = prefs.device_name();
        assert_eq!(prefs.current_device_name(), "ledflasher");

        prefs.set_device_name("ledflasher");
        assert!(!names.has_changed().unwrap());

        prefs.set_device_name("bench");
        assert!(names.has_changed().unwrap());
        assert_eq!(*names.borrow_and_update(), "bench");

        let mut tos = prefs.tos_accepted();
        prefs.set_tos_accepted(false);
        assert!(!tos.has_changed().unwrap());
        prefs.set_tos_accepted(true);
        assert!(tos.has_changed().unwrap());
        assert!(prefs.is_tos_accepted());
    }
}
