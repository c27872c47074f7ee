// ledweave-api: Async Rust client for the Weave device cloud

use async_trait::async_trait;
use tokio::sync::broadcast;

pub mod cloud;
pub mod error;
pub mod simulated;
pub mod types;

pub use error::Error;
pub use types::{
    Command, CommandResult, DeviceEvent, DeviceId, DeviceState, ModelManifest, WeaveDevice,
};

/// The injected vendor capability: everything the rest of the suite is
/// allowed to ask of the Weave cloud.
///
/// Application code holds an `Arc<dyn WeaveApi>` and never talks to the
/// wire directly, so every consumer runs unchanged against
/// [`cloud::CloudClient`] or [`simulated::SimulatedCloud`].
#[async_trait]
pub trait WeaveApi: Send + Sync {
    /// Begin (or join) device discovery. Events arrive in batches on the
    /// returned receiver. Calling while already loading hands out another
    /// receiver onto the same feed.
    async fn start_loading(&self) -> Result<broadcast::Receiver<DeviceEvent>, Error>;

    /// Stop producing discovery events. Idempotent.
    async fn stop_loading(&self);

    /// Whether a discovery feed is currently active.
    fn is_loading(&self) -> bool;

    /// Fetch the device's authoritative state tree.
    async fn get_state(&self, device: &DeviceId) -> Result<DeviceState, Error>;

    /// Run a named command against the device via the cloud.
    ///
    /// A device-rejected command comes back as an unsuccessful
    /// [`CommandResult`], not as an `Err`.
    async fn execute(&self, device: &DeviceId, command: Command) -> Result<CommandResult, Error>;

    /// Fetch model metadata by manifest id.
    async fn get_model_manifest(&self, manifest_id: &str) -> Result<ModelManifest, Error>;
}
