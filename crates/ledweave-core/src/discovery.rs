// ── Device discovery ──
//
// Bridges the capability trait's discovery feed into the device
// directory and watches it for the configured target device.

use std::sync::Arc;

use ledweave_api::{DeviceEvent, DeviceId, WeaveApi, WeaveDevice};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::store::{DeviceDirectory, ManifestCache};

const TARGET_EVENT_CHANNEL_SIZE: usize = 16;

/// Whether a discovery feed is currently running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiscoveryState {
    #[default]
    Idle,
    Discovering,
}

/// Which discovered device to track for LED control.
///
/// A device matches when its name equals the configured target name and
/// it is reachable over the cloud transport. Locally-discovered devices
/// without cloud reachability cannot be commanded and never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFilter {
    name: String,
}

impl TargetFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn matches(&self, device: &WeaveDevice) -> bool {
        device.name == self.name && device.discovery_transport.has_cloud()
    }
}

/// Target tracking notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetEvent {
    /// A device matching the target filter appeared. Emitted at most
    /// once per acquisition; further matches are ignored until the
    /// tracked device is lost.
    Acquired(WeaveDevice),
    /// The tracked device disappeared from the account.
    Lost(DeviceId),
}

struct Listener {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct DiscoveryInner {
    api: Arc<dyn WeaveApi>,
    directory: Arc<DeviceDirectory>,
    manifests: Arc<ManifestCache>,
    state: watch::Sender<DiscoveryState>,
    /// The device currently tracked for LED control. Doubles as the
    /// acquisition guard: `Some` suppresses further `Acquired` events.
    tracked: watch::Sender<Option<WeaveDevice>>,
    target_events: broadcast::Sender<TargetEvent>,
    listener: Mutex<Option<Listener>>,
}

/// One discovery run at a time.
///
/// [`start`](DiscoverySession::start) subscribes to the capability
/// trait's discovery feed and spawns a listener that folds `Found` /
/// `Lost` batches into the [`DeviceDirectory`], resolving model
/// manifests along the way. Starting again tears down the previous run
/// first, so there is never more than one listener writing to the
/// directory.
pub struct DiscoverySession {
    inner: Arc<DiscoveryInner>,
}

impl DiscoverySession {
    pub fn new(
        api: Arc<dyn WeaveApi>,
        directory: Arc<DeviceDirectory>,
        manifests: Arc<ManifestCache>,
    ) -> Self {
        let (state, _) = watch::channel(DiscoveryState::default());
        let (tracked, _) = watch::channel(None);
        let (target_events, _) = broadcast::channel(TARGET_EVENT_CHANNEL_SIZE);

        Self {
            inner: Arc::new(DiscoveryInner {
                api,
                directory,
                manifests,
                state,
                tracked,
                target_events,
                listener: Mutex::new(None),
            }),
        }
    }

    /// Start discovering, looking for `filter` along the way.
    ///
    /// Any previous run is stopped first and the directory is cleared,
    /// so the listing rebuilds from the feed's initial batch. The
    /// acquisition guard re-arms: the first match after this call emits
    /// [`TargetEvent::Acquired`] again.
    pub async fn start(&self, filter: TargetFilter) -> Result<(), CoreError> {
        self.stop().await;

        self.inner.directory.clear();
        self.inner.tracked.send_replace(None);

        let events = self.inner.api.start_loading().await?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(listen_task(
            Arc::clone(&self.inner),
            filter,
            events,
            cancel.clone(),
        ));
        *self.inner.listener.lock().await = Some(Listener { cancel, task });

        self.inner.state.send_replace(DiscoveryState::Discovering);
        debug!("discovery started");
        Ok(())
    }

    /// Stop discovering. Idempotent; the directory keeps its last
    /// contents so listings stay on screen.
    pub async fn stop(&self) {
        let listener = self.inner.listener.lock().await.take();
        if let Some(listener) = listener {
            listener.cancel.cancel();
            let _ = listener.task.await;
            debug!("discovery stopped");
        }
        self.inner.api.stop_loading().await;
        self.inner.state.send_replace(DiscoveryState::Idle);
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to discovery state changes.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<DiscoveryState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to changes of the tracked device.
    #[must_use]
    pub fn tracked(&self) -> watch::Receiver<Option<WeaveDevice>> {
        self.inner.tracked.subscribe()
    }

    /// The currently tracked device, if one has been acquired.
    #[must_use]
    pub fn tracked_device(&self) -> Option<WeaveDevice> {
        self.inner.tracked.borrow().clone()
    }

    /// Subscribe to target acquisition and loss events.
    #[must_use]
    pub fn target_events(&self) -> broadcast::Receiver<TargetEvent> {
        self.inner.target_events.subscribe()
    }
}

// ── Listener task ────────────────────────────────────────────────────

/// Fold discovery events into the directory until cancelled or the
/// feed closes.
async fn listen_task(
    inner: Arc<DiscoveryInner>,
    filter: TargetFilter,
    mut events: broadcast::Receiver<DeviceEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(DeviceEvent::Found(batch)) => handle_found(&inner, &filter, batch).await,
                Ok(DeviceEvent::Lost(batch)) => handle_lost(&inner, &batch),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "discovery feed lagged, device events were dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn handle_found(inner: &DiscoveryInner, filter: &TargetFilter, batch: Vec<WeaveDevice>) {
    for device in batch {
        let manifest = match &device.model_manifest_id {
            Some(id) => inner.manifests.get_or_fetch(inner.api.as_ref(), id).await,
            None => None,
        };

        if inner.directory.add(device.clone(), manifest) {
            debug!(device = %device.name, id = %device.id, "device found");
        }

        let already_tracking = inner.tracked.borrow().is_some();
        if !already_tracking && filter.matches(&device) {
            info!(device = %device.name, id = %device.id, "target device acquired");
            inner.tracked.send_replace(Some(device.clone()));
            let _ = inner.target_events.send(TargetEvent::Acquired(device));
        }
    }
}

fn handle_lost(inner: &DiscoveryInner, batch: &[WeaveDevice]) {
    for device in batch {
        if inner.directory.remove(&device.id).is_some() {
            debug!(device = %device.name, id = %device.id, "device lost");
        }

        let was_tracked = inner
            .tracked
            .borrow()
            .as_ref()
            .is_some_and(|tracked| tracked.id == device.id);
        if was_tracked {
            info!(device = %device.name, "target device lost");
            inner.tracked.send_replace(None);
            let _ = inner
                .target_events
                .send(TargetEvent::Lost(device.id.clone()));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use ledweave_api::simulated::SimulatedCloud;
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::timeout;

    use super::*;

    const WAIT: Duration = Duration::from_secs(2);

    struct Fixture {
        cloud: Arc<SimulatedCloud>,
        directory: Arc<DeviceDirectory>,
        session: DiscoverySession,
    }

    fn fixture() -> Fixture {
        let cloud = Arc::new(SimulatedCloud::new());
        let directory = Arc::new(DeviceDirectory::new());
        let manifests = Arc::new(ManifestCache::new());
        let session = DiscoverySession::new(
            cloud.clone(),
            Arc::clone(&directory),
            Arc::clone(&manifests),
        );
        Fixture {
            cloud,
            directory,
            session,
        }
    }

    async fn wait_for_len(directory: &DeviceDirectory, len: usize) {
        let mut rx = directory.subscribe();
        timeout(WAIT, rx.wait_for(|snapshot| snapshot.len() == len))
            .await
            .expect("directory did not settle")
            .expect("directory channel closed");
    }

    #[tokio::test]
    async fn found_batch_populates_directory_with_manifests() {
        let fx = fixture();
        fx.cloud.add_flasher("bench", &[true]);
        fx.cloud.add_device(ledweave_api::WeaveDevice {
            id: DeviceId::from("plain"),
            name: "thermostat".to_owned(),
            description: None,
            account: None,
            model_manifest_id: None,
            discovery_transport: ledweave_api::types::DiscoveryTransport::cloud_only(),
        });

        fx.session
            .start(TargetFilter::new("no such name"))
            .await
            .unwrap();
        wait_for_len(&fx.directory, 2).await;

        let snapshot = fx.directory.snapshot();
        assert_eq!(snapshot[0].model_name(), "LED Flasher");
        assert_eq!(snapshot[1].model_name(), crate::store::devices::UNKNOWN_DEVICE_KIND);
        assert!(fx.session.tracked_device().is_none());
    }

    #[tokio::test]
    async fn target_acquired_once_for_duplicate_names() {
        let fx = fixture();
        let first = fx.cloud.add_flasher("ledflasher", &[false]);
        fx.cloud.add_flasher("ledflasher", &[false, false]);

        let mut events = fx.session.target_events();
        fx.session
            .start(TargetFilter::new("ledflasher"))
            .await
            .unwrap();
        wait_for_len(&fx.directory, 2).await;

        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        match event {
            TargetEvent::Acquired(device) => assert_eq!(device.id, first),
            TargetEvent::Lost(_) => panic!("expected acquisition"),
        }

        // The second matching device does not emit another acquisition.
        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
        assert_eq!(fx.session.tracked_device().unwrap().id, first);
    }

    #[tokio::test]
    async fn losing_tracked_device_rearms_the_guard() {
        let fx = fixture();
        let id = fx.cloud.add_flasher("ledflasher", &[true]);

        let mut events = fx.session.target_events();
        fx.session
            .start(TargetFilter::new("ledflasher"))
            .await
            .unwrap();
        let acquired = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert!(matches!(acquired, TargetEvent::Acquired(_)));

        fx.cloud.detach(&id);
        let lost = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(lost, TargetEvent::Lost(id.clone()));
        wait_for_len(&fx.directory, 0).await;
        assert!(fx.session.tracked_device().is_none());

        // Reappearing re-acquires.
        fx.cloud.attach(&id);
        let reacquired = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        match reacquired {
            TargetEvent::Acquired(device) => assert_eq!(device.id, id),
            TargetEvent::Lost(_) => panic!("expected re-acquisition"),
        }
    }

    #[tokio::test]
    async fn losing_another_device_keeps_the_target() {
        let fx = fixture();
        fx.cloud.add_flasher("ledflasher", &[true]);
        let other = fx.cloud.add_flasher("workbench", &[false]);

        let mut events = fx.session.target_events();
        fx.session
            .start(TargetFilter::new("ledflasher"))
            .await
            .unwrap();
        wait_for_len(&fx.directory, 2).await;
        let _ = timeout(WAIT, events.recv()).await.unwrap().unwrap();

        fx.cloud.detach(&other);
        wait_for_len(&fx.directory, 1).await;

        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
        assert_eq!(fx.session.tracked_device().unwrap().name, "ledflasher");
    }

    #[tokio::test]
    async fn restart_clears_and_rebuilds_the_directory() {
        let fx = fixture();
        fx.cloud.add_flasher("ledflasher", &[true]);

        fx.session
            .start(TargetFilter::new("ledflasher"))
            .await
            .unwrap();
        wait_for_len(&fx.directory, 1).await;
        assert!(fx.cloud.is_loading());
        assert_eq!(*fx.session.state().borrow(), DiscoveryState::Discovering);

        fx.cloud.add_flasher("late arrival", &[false]);
        fx.session
            .start(TargetFilter::new("ledflasher"))
            .await
            .unwrap();
        wait_for_len(&fx.directory, 2).await;

        fx.session.stop().await;
        assert!(!fx.cloud.is_loading());
        assert_eq!(*fx.session.state().borrow(), DiscoveryState::Idle);
        // Listings stay on screen after a stop.
        assert_eq!(fx.directory.len(), 2);

        // stop is idempotent
        fx.session.stop().await;
    }
}
