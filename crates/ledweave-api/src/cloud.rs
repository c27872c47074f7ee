// Hand-crafted async HTTP client for the Weave device cloud REST surface.
//
// Base path: /weave/v1/
// Auth: Authorization: Bearer <access token>

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::types::{
    Command, CommandResult, DeviceEvent, DeviceId, DeviceListResponse, DeviceState, ModelManifest,
    WeaveDevice,
};
use crate::{Error, WeaveApi};

const USER_AGENT: &str = "ledweave/0.1.0";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ── Error response shape from the cloud ──────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    /// Symbolic code such as `NOT_FOUND`.
    #[serde(default)]
    status: Option<String>,
}

// ── Transport ────────────────────────────────────────────────────────

/// Shared HTTP plumbing: owned by the client and by the discovery poll
/// task it spawns.
struct Transport {
    http: reqwest::Client,
    base_url: Url,
}

impl Transport {
    /// Join a relative path (e.g. `"devices"`) onto the base URL.
    fn url(&self, path: &str) -> Url {
        // base_url always ends with `/weave/v1/`, so joining works.
        self.base_url
            .join(path)
            .expect("path should be valid relative URL")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path);
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path);
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview = &body[..body.len().min(200)];
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();
        let envelope = serde_json::from_str::<ErrorEnvelope>(&raw).ok();
        let body = envelope.and_then(|e| e.error);

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Error::Authentication {
                message: body
                    .and_then(|b| b.message)
                    .unwrap_or_else(|| status.to_string()),
            };
        }

        if let Some(body) = body {
            return Error::Cloud {
                status: status.as_u16(),
                message: body.message.unwrap_or_else(|| status.to_string()),
                code: body.status,
            };
        }

        Error::Cloud {
            status: status.as_u16(),
            message: if raw.is_empty() {
                status.to_string()
            } else {
                raw
            },
            code: None,
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the Weave device cloud.
///
/// Uses bearer-token authentication and communicates via JSON REST
/// endpoints under `/weave/v1/`. Discovery is list polling: a background
/// task diffs the device list and broadcasts [`DeviceEvent`] batches.
pub struct CloudClient {
    transport: Arc<Transport>,
    poll_interval: Duration,
    events: broadcast::Sender<DeviceEvent>,
    loader: Mutex<Option<Loader>>,
}

struct Loader {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CloudClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from an access token and request timeout.
    ///
    /// Injects `Authorization: Bearer …` as a default header on every
    /// request.
    pub fn from_access_token(
        base_url: &str,
        access_token: &SecretString,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(&format!("Bearer {}", access_token.expose_secret()))
            .map_err(|_| Error::InvalidAccessToken)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Self::from_reqwest(base_url, http)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            transport: Arc::new(Transport { http, base_url }),
            poll_interval: DEFAULT_POLL_INTERVAL,
            events,
            loader: Mutex::new(None),
        })
    }

    /// Change how often the discovery loader re-fetches the device list.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Build the base URL with the `/weave/v1/` suffix in place.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;

        // Strip trailing slash for uniform handling
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with("/weave/v1") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/weave/v1/"));
        }

        Ok(url)
    }
}

impl Drop for CloudClient {
    fn drop(&mut self) {
        let mut slot = self.loader.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(loader) = slot.take() {
            loader.cancel.cancel();
            loader.task.abort();
        }
    }
}

#[async_trait]
impl WeaveApi for CloudClient {
    async fn start_loading(&self) -> Result<broadcast::Receiver<DeviceEvent>, Error> {
        let mut slot = self.loader.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(active) = slot.as_ref() {
            if !active.task.is_finished() {
                return Ok(self.events.subscribe());
            }
        }

        let receiver = self.events.subscribe();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_devices(
            Arc::clone(&self.transport),
            self.events.clone(),
            self.poll_interval,
            cancel.clone(),
        ));
        *slot = Some(Loader { cancel, task });

        Ok(receiver)
    }

    async fn stop_loading(&self) {
        let loader = {
            let mut slot = self.loader.lock().unwrap_or_else(PoisonError::into_inner);
            slot.take()
        };

        if let Some(loader) = loader {
            loader.cancel.cancel();
            let _ = loader.task.await;
        }
    }

    fn is_loading(&self) -> bool {
        self.loader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|loader| !loader.task.is_finished())
    }

    async fn get_state(&self, device: &DeviceId) -> Result<DeviceState, Error> {
        self.transport
            .get(&format!("devices/{device}/state"))
            .await
    }

    async fn execute(&self, device: &DeviceId, command: Command) -> Result<CommandResult, Error> {
        self.transport
            .post(&format!("devices/{device}/commands"), &command)
            .await
    }

    async fn get_model_manifest(&self, manifest_id: &str) -> Result<ModelManifest, Error> {
        self.transport
            .get(&format!("modelManifests/{manifest_id}"))
            .await
    }
}

// ── Discovery poll loop ──────────────────────────────────────────────

/// Fetch the device list on an interval, diff against the previous
/// round, and broadcast `Found` / `Lost` batches. First tick fires
/// immediately, so subscribers see the initial population promptly.
async fn poll_devices(
    transport: Arc<Transport>,
    events: broadcast::Sender<DeviceEvent>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut seen: HashMap<DeviceId, WeaveDevice> = HashMap::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match transport.get::<DeviceListResponse>("devices").await {
            Ok(list) => {
                // Found batch preserves wire order; the directory keys
                // its rows off first appearance.
                let found: Vec<WeaveDevice> = list
                    .devices
                    .iter()
                    .filter(|device| !seen.contains_key(&device.id))
                    .cloned()
                    .collect();

                let incoming: HashMap<DeviceId, WeaveDevice> = list
                    .devices
                    .into_iter()
                    .map(|device| (device.id.clone(), device))
                    .collect();

                let lost: Vec<WeaveDevice> = seen
                    .values()
                    .filter(|device| !incoming.contains_key(&device.id))
                    .cloned()
                    .collect();

                if !found.is_empty() {
                    debug!(count = found.len(), "devices appeared");
                    let _ = events.send(DeviceEvent::Found(found));
                }
                if !lost.is_empty() {
                    debug!(count = lost.len(), "devices disappeared");
                    let _ = events.send(DeviceEvent::Lost(lost));
                }

                seen = incoming;
            }
            Err(err) => warn!("device list poll failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_weave_suffix() {
        let url = CloudClient::normalize_base_url("https://cloud.example.com").expect("parse");
        assert_eq!(url.as_str(), "https://cloud.example.com/weave/v1/");
    }

    #[test]
    fn base_url_with_suffix_is_left_alone() {
        let url =
            CloudClient::normalize_base_url("https://cloud.example.com/weave/v1/").expect("parse");
        assert_eq!(url.as_str(), "https://cloud.example.com/weave/v1/");
    }

    #[test]
    fn base_url_keeps_leading_path() {
        let url = CloudClient::normalize_base_url("https://example.com/api/").expect("parse");
        assert_eq!(url.as_str(), "https://example.com/api/weave/v1/");
    }
}
