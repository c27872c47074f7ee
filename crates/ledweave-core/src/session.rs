// ── Weave session facade ──
//
// The one object consumers hold. Owns the stores, discovery, and the
// LED synchronizer; runs background tasks for request processing and
// target tracking; exposes reactive accessors over all of it.

use std::sync::Arc;

use ledweave_api::{WeaveApi, WeaveDevice};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::discovery::{DiscoverySession, DiscoveryState, TargetEvent, TargetFilter};
use crate::error::CoreError;
use crate::model::Led;
use crate::notice::{Notice, NoticeSender};
use crate::store::{DeviceDirectory, DeviceEntry, LedPanel, LedsUpdate, ManifestCache};
use crate::sync::LedStateSync;

const REQUEST_CHANNEL_SIZE: usize = 64;

/// LED work routed through the request processor.
enum SessionRequest {
    SetLed { index: usize, on: bool },
    RefreshLeds,
    ClearLeds,
}

struct RequestEnvelope {
    request: SessionRequest,
    response_tx: oneshot::Sender<Result<(), CoreError>>,
}

struct SessionInner {
    api: Arc<dyn WeaveApi>,
    directory: Arc<DeviceDirectory>,
    panel: Arc<LedPanel>,
    discovery: DiscoverySession,
    sync: LedStateSync,
    notices: NoticeSender,
    /// Configured target device name; changes restart discovery.
    target_name: watch::Receiver<String>,
    request_tx: mpsc::Sender<RequestEnvelope>,
    request_rx: Mutex<Option<mpsc::Receiver<RequestEnvelope>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to a running Weave session. Cheap to clone.
///
/// All remote LED work funnels through one request-processor task, so
/// commands against the tracked device run one at a time in submission
/// order, and the panel only ever has a single writing task (plus the
/// caller-side optimistic toggle). The device directory is written only
/// by the discovery listener.
#[derive(Clone)]
pub struct WeaveSession {
    inner: Arc<SessionInner>,
}

impl WeaveSession {
    /// Create a session over `api`, tracking whichever device carries
    /// the name in `target_name`. Nothing runs until
    /// [`start`](Self::start).
    #[must_use]
    pub fn new(api: Arc<dyn WeaveApi>, target_name: watch::Receiver<String>) -> Self {
        let directory = Arc::new(DeviceDirectory::new());
        let panel = Arc::new(LedPanel::new());
        let manifests = Arc::new(ManifestCache::new());
        let notices = NoticeSender::new();

        let discovery = DiscoverySession::new(
            Arc::clone(&api),
            Arc::clone(&directory),
            Arc::clone(&manifests),
        );
        let sync = LedStateSync::new(Arc::clone(&api), Arc::clone(&panel), notices.clone());

        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);

        Self {
            inner: Arc::new(SessionInner {
                api,
                directory,
                panel,
                discovery,
                sync,
                notices,
                target_name,
                request_tx,
                request_rx: Mutex::new(Some(request_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start the session.
    ///
    /// Spawns the background tasks (request processor, target tracker,
    /// preference watcher) and begins discovery for the configured
    /// target device.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut handles = self.inner.task_handles.lock().await;

        if let Some(rx) = self.inner.request_rx.lock().await.take() {
            let session = self.clone();
            handles.push(tokio::spawn(request_processor_task(session, rx)));

            let session = self.clone();
            let events = self.inner.discovery.target_events();
            handles.push(tokio::spawn(target_event_task(session, events)));

            let session = self.clone();
            handles.push(tokio::spawn(preference_task(session)));
        }
        drop(handles);

        self.start_discovery().await?;
        info!("session started");
        Ok(())
    }

    /// Shut down: stop discovery, cancel background tasks, join them.
    pub async fn shutdown(&self) {
        self.inner.discovery.stop().await;
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("session shut down");
    }

    // ── Discovery control ────────────────────────────────────────────

    /// Stop discovering. Device listings stay on screen.
    pub async fn stop_discovery(&self) {
        self.inner.discovery.stop().await;
    }

    /// Heavy-handed refresh: clear the LED panel, restart discovery
    /// from scratch, and let the directory rebuild from the feed.
    pub async fn refresh_devices(&self) -> Result<(), CoreError> {
        self.request(SessionRequest::ClearLeds).await?;
        if self.inner.api.is_loading() {
            self.inner.discovery.stop().await;
        }
        self.start_discovery().await
    }

    // ── LED control ──────────────────────────────────────────────────

    /// Optimistic toggle: flip the local LED immediately and queue the
    /// cloud command. Returns the new local state without waiting; if
    /// the cloud later disagrees, that surfaces as a notice, not a
    /// rollback.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range, like [`LedPanel::toggle`].
    pub fn toggle_led(&self, index: usize) -> Result<bool, CoreError> {
        let on = self.inner.panel.toggle(index);

        let (response_tx, _response_rx) = oneshot::channel();
        self.inner
            .request_tx
            .try_send(RequestEnvelope {
                request: SessionRequest::SetLed { index, on },
                response_tx,
            })
            .map_err(|err| match err {
                TrySendError::Full(_) => CoreError::CommandFailed {
                    message: "command queue is full".into(),
                },
                TrySendError::Closed(_) => CoreError::SessionClosed,
            })?;
        Ok(on)
    }

    /// Push one LED's state to the tracked device and wait for the
    /// outcome. Does not touch the local panel.
    pub async fn set_led(&self, index: usize, on: bool) -> Result<(), CoreError> {
        self.request(SessionRequest::SetLed { index, on }).await
    }

    /// Re-query the tracked device's state and replace the panel.
    pub async fn refresh_leds(&self) -> Result<(), CoreError> {
        self.request(SessionRequest::RefreshLeds).await
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to device directory snapshots.
    #[must_use]
    pub fn devices(&self) -> watch::Receiver<Arc<Vec<DeviceEntry>>> {
        self.inner.directory.subscribe()
    }

    #[must_use]
    pub fn devices_snapshot(&self) -> Arc<Vec<DeviceEntry>> {
        self.inner.directory.snapshot()
    }

    /// Subscribe to LED panel updates.
    #[must_use]
    pub fn leds(&self) -> watch::Receiver<LedsUpdate> {
        self.inner.panel.subscribe()
    }

    #[must_use]
    pub fn leds_snapshot(&self) -> Arc<Vec<Led>> {
        self.inner.panel.states()
    }

    /// Subscribe to the busy flag (high while a state read is in flight).
    #[must_use]
    pub fn busy(&self) -> watch::Receiver<bool> {
        self.inner.sync.busy()
    }

    /// Subscribe to discovery state changes.
    #[must_use]
    pub fn discovery_state(&self) -> watch::Receiver<DiscoveryState> {
        self.inner.discovery.state()
    }

    /// Subscribe to changes of the tracked device.
    #[must_use]
    pub fn tracked(&self) -> watch::Receiver<Option<WeaveDevice>> {
        self.inner.discovery.tracked()
    }

    /// The currently tracked device, if one has been acquired.
    #[must_use]
    pub fn tracked_device(&self) -> Option<WeaveDevice> {
        self.inner.discovery.tracked_device()
    }

    /// Subscribe to user-facing notices.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    // ── One-shot convenience ─────────────────────────────────────────

    /// One-shot: start, run closure, shut down.
    ///
    /// For CLI commands that need a live session for a single
    /// request-response cycle.
    pub async fn oneshot<F, Fut, T>(
        api: Arc<dyn WeaveApi>,
        target_name: &str,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(WeaveSession) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let (_name_tx, name_rx) = watch::channel(target_name.to_owned());
        let session = WeaveSession::new(api, name_rx);
        session.start().await?;
        let result = f(session.clone()).await;
        session.shutdown().await;
        result
    }

    // ── Private helpers ──────────────────────────────────────────────

    async fn start_discovery(&self) -> Result<(), CoreError> {
        let name = self.inner.target_name.borrow().clone();
        self.inner.discovery.start(TargetFilter::new(name)).await
    }

    async fn request(&self, request: SessionRequest) -> Result<(), CoreError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.inner
            .request_tx
            .send(RequestEnvelope {
                request,
                response_tx,
            })
            .await
            .map_err(|_| CoreError::SessionClosed)?;
        response_rx.await.map_err(|_| CoreError::SessionClosed)?
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Process queued LED requests one at a time, so commands against the
/// tracked device go out in submission order.
async fn request_processor_task(session: WeaveSession, mut rx: mpsc::Receiver<RequestEnvelope>) {
    let cancel = session.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_request(&session, envelope.request).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

async fn route_request(session: &WeaveSession, request: SessionRequest) -> Result<(), CoreError> {
    match request {
        SessionRequest::SetLed { index, on } => {
            let device = session.tracked_device().ok_or(CoreError::NoTrackedDevice)?;
            session.inner.sync.set_led(&device, index, on).await
        }
        SessionRequest::RefreshLeds => {
            let device = session.tracked_device().ok_or(CoreError::NoTrackedDevice)?;
            session.inner.sync.refresh(&device).await
        }
        SessionRequest::ClearLeds => {
            session.inner.panel.clear();
            Ok(())
        }
    }
}

/// React to target acquisition and loss.
async fn target_event_task(session: WeaveSession, mut events: broadcast::Receiver<TargetEvent>) {
    let cancel = session.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(TargetEvent::Acquired(device)) => {
                    session
                        .inner
                        .notices
                        .info(format!("Connected to \"{}\"", device.name));
                    // The target is in hand; the feed has done its job.
                    session.inner.discovery.stop().await;
                    if let Err(err) = session.refresh_leds().await {
                        warn!(error = %err, "initial LED state load failed");
                    }
                }
                Ok(TargetEvent::Lost(id)) => {
                    session
                        .inner
                        .notices
                        .warning(format!("Lost contact with device {id}"));
                    let _ = session.request(SessionRequest::ClearLeds).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "target event feed lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

/// Restart discovery whenever the configured target name changes.
async fn preference_task(session: WeaveSession) {
    let cancel = session.inner.cancel.clone();
    let mut names = session.inner.target_name.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = names.changed() => {
                if changed.is_err() {
                    break;
                }
                let name = names.borrow_and_update().clone();
                info!(%name, "target device name changed, rediscovering");
                if let Err(err) = session.refresh_devices().await {
                    warn!(error = %err, "rediscovery after preference change failed");
                }
            }
        }
    }
}
