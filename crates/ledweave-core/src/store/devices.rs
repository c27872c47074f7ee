// ── Device directory ──
//
// Ordered storage for discovered devices with push-based change
// notification via a `watch` snapshot channel.

use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use ledweave_api::{DeviceId, ModelManifest, WeaveDevice};
use serde::Serialize;
use tokio::sync::watch;

/// Shown in place of a model name when the manifest lookup failed.
pub const UNKNOWN_DEVICE_KIND: &str = "unknown device type";

/// A discovered device together with its resolved model manifest.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceEntry {
    pub device: WeaveDevice,
    /// `None` when the manifest id was absent or the lookup failed.
    pub manifest: Option<ModelManifest>,
}

impl DeviceEntry {
    /// Display name of the device model, with a fallback for devices
    /// whose manifest could not be resolved.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.manifest
            .as_ref()
            .map_or(UNKNOWN_DEVICE_KIND, |manifest| manifest.model_name.as_str())
    }
}

/// The set of devices the cloud currently reports for the account.
///
/// Devices are kept in the order the cloud first listed them, so every
/// consumer renders the same stable ordering. Re-adding a known device
/// updates it in place without moving it. Every mutation rebuilds the
/// snapshot that subscribers receive.
pub struct DeviceDirectory {
    entries: Mutex<IndexMap<DeviceId, DeviceEntry>>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Arc<Vec<DeviceEntry>>>,
}

impl DeviceDirectory {
    #[must_use]
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            entries: Mutex::new(IndexMap::new()),
            snapshot,
        }
    }

    /// Insert or update a device. Returns `true` if the id was new.
    pub fn add(&self, device: WeaveDevice, manifest: Option<ModelManifest>) -> bool {
        let mut entries = self.lock();
        let is_new = !entries.contains_key(&device.id);
        entries.insert(device.id.clone(), DeviceEntry { device, manifest });
        self.rebuild_snapshot(&entries);
        is_new
    }

    /// Remove a device by id. Returns the removed entry if it existed.
    pub fn remove(&self, id: &DeviceId) -> Option<DeviceEntry> {
        let mut entries = self.lock();
        // shift_remove keeps the remaining entries in order.
        let removed = entries.shift_remove(id);
        if removed.is_some() {
            self.rebuild_snapshot(&entries);
        }
        removed
    }

    #[must_use]
    pub fn get(&self, id: &DeviceId) -> Option<DeviceEntry> {
        self.lock().get(id).cloned()
    }

    /// Remove all devices.
    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.clear();
        self.rebuild_snapshot(&entries);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Get the current snapshot (cheap `Arc` clone).
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<DeviceEntry>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<DeviceEntry>>> {
        self.snapshot.subscribe()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<DeviceId, DeviceEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Collect all entries into a snapshot vec and broadcast to subscribers.
    fn rebuild_snapshot(&self, entries: &IndexMap<DeviceId, DeviceEntry>) {
        let values: Vec<DeviceEntry> = entries.values().cloned().collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

impl Default for DeviceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn device(id: &str, name: &str) -> WeaveDevice {
        WeaveDevice {
            id: DeviceId::from(id),
            name: name.to_owned(),
            description: None,
            account: None,
            model_manifest_id: None,
            discovery_transport: ledweave_api::types::DiscoveryTransport::cloud_only(),
        }
    }

    #[test]
    fn add_returns_true_for_new_id() {
        let dir = DeviceDirectory::new();
        assert!(dir.add(device("d1", "flasher"), None));
        assert!(!dir.add(device("d1", "flasher renamed"), None));
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get(&DeviceId::from("d1")).unwrap().device.name, "flasher renamed");
    }

    #[test]
    fn snapshot_preserves_first_seen_order() {
        let dir = DeviceDirectory::new();
        dir.add(device("b", "second"), None);
        dir.add(device("a", "first"), None);
        dir.add(device("b", "second updated"), None);

        let snapshot = dir.snapshot();
        let names: Vec<&str> = snapshot
            .iter()
            .map(|entry| entry.device.name.as_str())
            .collect();
        assert_eq!(names, ["second updated", "first"]);
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let dir = DeviceDirectory::new();
        dir.add(device("a", "a"), None);
        dir.add(device("b", "b"), None);
        dir.add(device("c", "c"), None);

        let removed = dir.remove(&DeviceId::from("b"));
        assert_eq!(removed.unwrap().device.name, "b");
        assert!(dir.remove(&DeviceId::from("b")).is_none());

        let snapshot = dir.snapshot();
        let names: Vec<&str> = snapshot
            .iter()
            .map(|entry| entry.device.name.as_str())
            .collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn clear_empties_everything() {
        let dir = DeviceDirectory::new();
        dir.add(device("a", "a"), None);
        dir.add(device("b", "b"), None);

        dir.clear();
        assert!(dir.is_empty());
        assert!(dir.snapshot().is_empty());
    }

    #[test]
    fn subscribers_see_mutations() {
        let dir = DeviceDirectory::new();
        let mut rx = dir.subscribe();
        assert!(!rx.has_changed().unwrap());

        dir.add(device("a", "a"), None);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    #[test]
    fn model_name_falls_back_for_missing_manifest() {
        let entry = DeviceEntry {
            device: device("a", "a"),
            manifest: None,
        };
        assert_eq!(entry.model_name(), UNKNOWN_DEVICE_KIND);

        let entry = DeviceEntry {
            device: device("a", "a"),
            manifest: Some(ModelManifest {
                id: "led-flasher".into(),
                model_name: "LED Flasher".into(),
                device_kind: None,
            }),
        };
        assert_eq!(entry.model_name(), "LED Flasher");
    }
}
