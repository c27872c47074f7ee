// In-memory Weave cloud: backs `--simulate` runs and exercises every
// consumer of the capability trait without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::json;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::{
    Command, CommandError, CommandResult, CommandState, DeviceEvent, DeviceId, DeviceState,
    DiscoveryTransport, ModelManifest, WeaveDevice,
};
use crate::{Error, WeaveApi};

const EVENT_CHANNEL_CAPACITY: usize = 64;
const FLASHER_MANIFEST_ID: &str = "led-flasher";

/// A virtual device registered with the simulated cloud.
struct SimDevice {
    device: WeaveDevice,
    /// Per-LED on/off states; `None` for devices without the flasher trait.
    leds: Option<Vec<bool>>,
    /// Detached devices stay registered but are invisible to discovery.
    attached: bool,
}

struct Inner {
    devices: IndexMap<DeviceId, SimDevice>,
    manifests: HashMap<String, ModelManifest>,
    executed: Vec<(DeviceId, Command)>,
}

/// In-memory [`WeaveApi`] implementation.
///
/// Devices are registered up front (or attached later); discovery emits
/// the attached population as a `Found` batch and reacts to
/// [`attach`](Self::attach) / [`detach`](Self::detach). `_ledflasher._set`
/// commands are applied to the virtual LEDs; everything executed is
/// recorded for inspection.
pub struct SimulatedCloud {
    inner: Mutex<Inner>,
    events: broadcast::Sender<DeviceEvent>,
    loading: AtomicBool,
    offline: AtomicBool,
}

impl Default for SimulatedCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCloud {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                devices: IndexMap::new(),
                manifests: HashMap::new(),
                executed: Vec::new(),
            }),
            events,
            loading: AtomicBool::new(false),
            offline: AtomicBool::new(false),
        }
    }

    /// A cloud pre-seeded with demo devices, used by `--simulate`.
    pub fn demo() -> Self {
        let cloud = Self::new();
        cloud.add_flasher("ledflasher", &[false, false, false, false]);
        cloud.add_flasher("workbench flasher", &[true, false]);
        cloud.add_device(WeaveDevice {
            id: DeviceId::new(format!("sim-{}", Uuid::new_v4())),
            name: "thermostat".to_owned(),
            description: Some("no flasher trait".to_owned()),
            account: None,
            model_manifest_id: None,
            discovery_transport: DiscoveryTransport::cloud_only(),
        });
        cloud
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register an attached LED-flasher device with the given initial
    /// LED states. A generic flasher manifest is registered on first use.
    pub fn add_flasher(&self, name: &str, leds: &[bool]) -> DeviceId {
        let id = DeviceId::new(format!("sim-{}", Uuid::new_v4()));
        let device = WeaveDevice {
            id: id.clone(),
            name: name.to_owned(),
            description: None,
            account: None,
            model_manifest_id: Some(FLASHER_MANIFEST_ID.to_owned()),
            discovery_transport: DiscoveryTransport::cloud_only(),
        };

        let mut inner = self.lock();
        inner
            .manifests
            .entry(FLASHER_MANIFEST_ID.to_owned())
            .or_insert_with(|| ModelManifest {
                id: FLASHER_MANIFEST_ID.to_owned(),
                model_name: "LED Flasher".to_owned(),
                device_kind: Some("flasher".to_owned()),
            });
        inner.devices.insert(
            id.clone(),
            SimDevice {
                device,
                leds: Some(leds.to_vec()),
                attached: true,
            },
        );

        id
    }

    /// Register an attached device without the flasher trait. Its state
    /// tree has no `_ledflasher` component.
    pub fn add_device(&self, device: WeaveDevice) -> DeviceId {
        let id = device.id.clone();
        self.lock().devices.insert(
            id.clone(),
            SimDevice {
                device,
                leds: None,
                attached: true,
            },
        );
        id
    }

    pub fn add_manifest(&self, manifest: ModelManifest) {
        self.lock().manifests.insert(manifest.id.clone(), manifest);
    }

    // ── Presence ─────────────────────────────────────────────────────

    /// Make a detached device visible again and announce it.
    pub fn attach(&self, id: &DeviceId) {
        let announced = {
            let mut inner = self.lock();
            inner.devices.get_mut(id).map(|sim| {
                sim.attached = true;
                sim.device.clone()
            })
        };
        if let Some(device) = announced {
            let _ = self.events.send(DeviceEvent::Found(vec![device]));
        }
    }

    /// Hide a device from discovery and announce the loss.
    pub fn detach(&self, id: &DeviceId) {
        let announced = {
            let mut inner = self.lock();
            inner.devices.get_mut(id).map(|sim| {
                sim.attached = false;
                sim.device.clone()
            })
        };
        if let Some(device) = announced {
            let _ = self.events.send(DeviceEvent::Lost(vec![device]));
        }
    }

    // ── Fault injection & inspection ─────────────────────────────────

    /// While offline, every cloud call fails with a 503.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Current LED states of a registered flasher.
    pub fn led_states(&self, id: &DeviceId) -> Option<Vec<bool>> {
        self.lock().devices.get(id).and_then(|sim| sim.leds.clone())
    }

    /// Every command that reached a registered device, in execution order.
    pub fn executed_commands(&self) -> Vec<(DeviceId, Command)> {
        self.lock().executed.clone()
    }

    fn check_online(&self) -> Result<(), Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Cloud {
                status: 503,
                message: "simulated cloud offline".to_owned(),
                code: Some("UNAVAILABLE".to_owned()),
            });
        }
        Ok(())
    }

    fn not_found(what: &DeviceId) -> Error {
        Error::Cloud {
            status: 404,
            message: format!("unknown device {what}"),
            code: Some("NOT_FOUND".to_owned()),
        }
    }

    fn failed(message: impl Into<String>) -> CommandResult {
        CommandResult {
            state: CommandState::Error,
            error: Some(CommandError {
                code: Some("invalidCommand".to_owned()),
                message: Some(message.into()),
            }),
            results: None,
        }
    }
}

#[async_trait]
impl WeaveApi for SimulatedCloud {
    async fn start_loading(&self) -> Result<broadcast::Receiver<DeviceEvent>, Error> {
        self.check_online()?;
        self.loading.store(true, Ordering::SeqCst);

        let receiver = self.events.subscribe();
        let attached: Vec<WeaveDevice> = self
            .lock()
            .devices
            .values()
            .filter(|sim| sim.attached)
            .map(|sim| sim.device.clone())
            .collect();
        if !attached.is_empty() {
            let _ = self.events.send(DeviceEvent::Found(attached));
        }

        Ok(receiver)
    }

    async fn stop_loading(&self) {
        self.loading.store(false, Ordering::SeqCst);
    }

    fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    async fn get_state(&self, device: &DeviceId) -> Result<DeviceState, Error> {
        self.check_online()?;

        let inner = self.lock();
        let sim = inner.devices.get(device).ok_or_else(|| Self::not_found(device))?;

        let mut state = serde_json::Map::new();
        state.insert("base".to_owned(), json!({"firmwareVersion": "1.0.0"}));
        if let Some(leds) = &sim.leds {
            state.insert("_ledflasher".to_owned(), json!({"_leds": leds}));
        }

        Ok(DeviceState::from(state))
    }

    async fn execute(&self, device: &DeviceId, command: Command) -> Result<CommandResult, Error> {
        self.check_online()?;

        let mut inner = self.lock();
        if !inner.devices.contains_key(device) {
            return Err(Self::not_found(device));
        }
        inner.executed.push((device.clone(), command.clone()));

        if command.name != "_ledflasher._set" {
            return Ok(Self::failed(format!("unknown command {}", command.name)));
        }

        let index = command.parameters.get("_led").and_then(serde_json::Value::as_u64);
        let on = command.parameters.get("_on").and_then(serde_json::Value::as_bool);
        let (Some(index), Some(on)) = (index, on) else {
            return Ok(Self::failed("_led and _on parameters are required"));
        };

        let sim = inner
            .devices
            .get_mut(device)
            .ok_or_else(|| Self::not_found(device))?;
        let Some(leds) = sim.leds.as_mut() else {
            return Ok(Self::failed("device has no _ledflasher trait"));
        };

        // `_led` is 1-based on the wire.
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| leds.get_mut(i));
        match slot {
            Some(led) => {
                *led = on;
                Ok(CommandResult {
                    state: CommandState::Done,
                    error: None,
                    results: None,
                })
            }
            None => Ok(Self::failed(format!("parameter _led {index} out of range"))),
        }
    }

    async fn get_model_manifest(&self, manifest_id: &str) -> Result<ModelManifest, Error> {
        self.check_online()?;

        self.lock()
            .manifests
            .get(manifest_id)
            .cloned()
            .ok_or_else(|| Error::Cloud {
                status: 404,
                message: format!("unknown manifest {manifest_id}"),
                code: Some("NOT_FOUND".to_owned()),
            })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn set_command_applies_one_based_index() {
        let cloud = SimulatedCloud::new();
        let id = cloud.add_flasher("bench", &[false, false, false]);

        let result = cloud
            .execute(
                &id,
                Command::new("_ledflasher._set").param("_led", 3).param("_on", true),
            )
            .await
            .expect("execute");

        assert!(result.is_success());
        assert_eq!(cloud.led_states(&id), Some(vec![false, false, true]));
    }

    #[tokio::test]
    async fn out_of_range_index_reports_failure_without_mutation() {
        let cloud = SimulatedCloud::new();
        let id = cloud.add_flasher("bench", &[false, false]);

        let result = cloud
            .execute(
                &id,
                Command::new("_ledflasher._set").param("_led", 3).param("_on", true),
            )
            .await
            .expect("execute");

        assert!(!result.is_success());
        assert_eq!(cloud.led_states(&id), Some(vec![false, false]));
    }

    #[tokio::test]
    async fn unknown_device_is_not_found() {
        let cloud = SimulatedCloud::new();
        let err = cloud
            .execute(&DeviceId::from("nope"), Command::new("_ledflasher._set"))
            .await
            .expect_err("unknown device");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn state_of_plain_device_lacks_flasher_component() {
        let cloud = SimulatedCloud::new();
        let id = cloud.add_device(WeaveDevice {
            id: DeviceId::from("plain-1"),
            name: "thermostat".to_owned(),
            description: None,
            account: None,
            model_manifest_id: None,
            discovery_transport: DiscoveryTransport::cloud_only(),
        });

        let state = cloud.get_state(&id).await.expect("state");
        assert!(state.get("_ledflasher").is_none());
        assert!(state.get("base").is_some());
    }

    #[tokio::test]
    async fn detach_announces_loss_to_active_feed() {
        let cloud = SimulatedCloud::new();
        let id = cloud.add_flasher("bench", &[false]);

        let mut rx = cloud.start_loading().await.expect("start");
        let initial = rx.recv().await.expect("initial batch");
        assert!(matches!(initial, DeviceEvent::Found(ref batch) if batch.len() == 1));

        cloud.detach(&id);
        let lost = rx.recv().await.expect("lost event");
        match lost {
            DeviceEvent::Lost(batch) => assert_eq!(batch[0].id, id),
            DeviceEvent::Found(_) => panic!("expected Lost"),
        }
    }

    #[tokio::test]
    async fn offline_cloud_rejects_calls() {
        let cloud = SimulatedCloud::new();
        let id = cloud.add_flasher("bench", &[false]);
        cloud.set_offline(true);

        let err = cloud.get_state(&id).await.expect_err("offline");
        assert!(matches!(err, Error::Cloud { status: 503, .. }));

        cloud.set_offline(false);
        assert!(cloud.get_state(&id).await.is_ok());
    }

    #[tokio::test]
    async fn executed_commands_are_recorded_in_order() {
        let cloud = SimulatedCloud::new();
        let id = cloud.add_flasher("bench", &[false, false]);

        for index in [1_u64, 2] {
            cloud
                .execute(
                    &id,
                    Command::new("_ledflasher._set").param("_led", index).param("_on", true),
                )
                .await
                .expect("execute");
        }

        let log = cloud.executed_commands();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].1.parameters.get("_led"), Some(&serde_json::json!(1)));
        assert_eq!(log[1].1.parameters.get("_led"), Some(&serde_json::json!(2)));
    }
}
