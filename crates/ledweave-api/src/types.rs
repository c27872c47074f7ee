//! Wire types for the Weave device cloud.
//!
//! All types match the JSON exchanged with the cloud REST surface.
//! Field names use camelCase via `#[serde(rename_all = "camelCase")]`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Identifiers ──────────────────────────────────────────────────────

/// Opaque cloud-assigned device identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

// ── Devices ──────────────────────────────────────────────────────────

/// Transports a device was discovered over.
///
/// Only the cloud flag gates remote control; the local flag is carried
/// for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryTransport {
    #[serde(default)]
    pub cloud: bool,
    #[serde(default)]
    pub local: bool,
}

impl DiscoveryTransport {
    /// Transport with only the cloud channel available.
    pub fn cloud_only() -> Self {
        Self {
            cloud: true,
            local: false,
        }
    }

    pub fn has_cloud(&self) -> bool {
        self.cloud
    }

    pub fn has_local(&self) -> bool {
        self.local
    }
}

/// Device record — from `GET devices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaveDevice {
    pub id: DeviceId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Owning account, when the caller is authorized to see it.
    #[serde(default)]
    pub account: Option<String>,
    /// Reference into the model manifest registry.
    #[serde(default)]
    pub model_manifest_id: Option<String>,
    #[serde(default)]
    pub discovery_transport: DiscoveryTransport,
}

/// List envelope — from `GET devices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListResponse {
    #[serde(default)]
    pub devices: Vec<WeaveDevice>,
}

// ── Model manifests ──────────────────────────────────────────────────

/// Vendor metadata describing a device model — from `GET modelManifests/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelManifest {
    pub id: String,
    pub model_name: String,
    #[serde(default)]
    pub device_kind: Option<String>,
}

// ── Device state ─────────────────────────────────────────────────────

/// A device's key-value state tree — from `GET devices/{id}/state`.
///
/// Components are keyed by trait name (e.g. `"_ledflasher"`); each value
/// is an arbitrary JSON subtree owned by that trait.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceState(Map<String, Value>);

impl DeviceState {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up `outer.inner` in one step.
    pub fn get_path(&self, outer: &str, inner: &str) -> Option<&Value> {
        self.0.get(outer)?.get(inner)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for DeviceState {
    fn from(values: Map<String, Value>) -> Self {
        Self(values)
    }
}

// ── Commands ─────────────────────────────────────────────────────────

/// A named command with free-form parameters — body of
/// `POST devices/{id}/commands`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Map::new(),
        }
    }

    /// Add a parameter, builder-style.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Lifecycle state of an executed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandState {
    Done,
    InProgress,
    Queued,
    Cancelled,
    Aborted,
    Expired,
    /// Device or cloud rejected the command. Also the catch-all for
    /// states this client does not know.
    #[serde(other)]
    Error,
}

/// Device-reported failure detail inside a [`CommandResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (Some(code), None) => f.write_str(code),
            (None, Some(message)) => f.write_str(message),
            (None, None) => f.write_str("unspecified command error"),
        }
    }
}

/// Outcome of `POST devices/{id}/commands`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub state: CommandState,
    #[serde(default)]
    pub error: Option<CommandError>,
    /// Command-specific return values, when the device produces any.
    #[serde(default)]
    pub results: Option<Value>,
}

impl CommandResult {
    /// Whether the cloud accepted the command and the device reported no
    /// error. `Queued` and `InProgress` count as accepted; completion is
    /// not polled.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
            && matches!(
                self.state,
                CommandState::Done | CommandState::InProgress | CommandState::Queued
            )
    }
}

// ── Discovery events ─────────────────────────────────────────────────

/// Batched device discovery notifications.
///
/// Mirrors the loader callbacks of the vendor SDK: devices appear and
/// disappear in batches, not one at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Found(Vec<WeaveDevice>),
    Lost(Vec<WeaveDevice>),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn command_serializes_name_and_parameters() {
        let cmd = Command::new("_ledflasher._set")
            .param("_led", 3)
            .param("_on", true);

        let value = serde_json::to_value(&cmd).expect("serialize");
        assert_eq!(
            value,
            json!({
                "name": "_ledflasher._set",
                "parameters": {"_led": 3, "_on": true},
            })
        );
    }

    #[test]
    fn command_result_success_rules() {
        let ok = CommandResult {
            state: CommandState::Done,
            error: None,
            results: None,
        };
        assert!(ok.is_success());

        let queued = CommandResult {
            state: CommandState::Queued,
            error: None,
            results: None,
        };
        assert!(queued.is_success());

        let failed_state = CommandResult {
            state: CommandState::Aborted,
            error: None,
            results: None,
        };
        assert!(!failed_state.is_success());

        let carried_error = CommandResult {
            state: CommandState::Done,
            error: Some(CommandError {
                code: Some("invalidParameter".into()),
                message: None,
            }),
            results: None,
        };
        assert!(!carried_error.is_success());
    }

    #[test]
    fn unknown_command_state_falls_back_to_error() {
        let result: CommandResult =
            serde_json::from_value(json!({"state": "somethingNew"})).expect("deserialize");
        assert_eq!(result.state, CommandState::Error);
    }

    #[test]
    fn device_deserializes_with_sparse_fields() {
        let device: WeaveDevice = serde_json::from_value(json!({
            "id": "d-1",
            "name": "ledflasher",
        }))
        .expect("deserialize");

        assert_eq!(device.id, DeviceId::from("d-1"));
        assert!(device.description.is_none());
        assert!(!device.discovery_transport.has_cloud());
    }

    #[test]
    fn device_state_path_lookup() {
        let state: DeviceState = serde_json::from_value(json!({
            "_ledflasher": {"_leds": [true, false]},
        }))
        .expect("deserialize");

        assert_eq!(
            state.get_path("_ledflasher", "_leds"),
            Some(&json!([true, false]))
        );
        assert_eq!(state.get_path("_ledflasher", "_missing"), None);
        assert_eq!(state.get_path("_power", "_leds"), None);
    }
}
