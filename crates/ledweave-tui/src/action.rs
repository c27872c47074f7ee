//! All possible UI actions. Actions are the sole mechanism for state mutation.

use std::sync::Arc;

use ledweave_api::WeaveDevice;
use ledweave_core::{DeviceEntry, DiscoveryState, LedsUpdate, Notice};

use crate::screen::ScreenId;

/// Every state transition in the TUI is expressed as an Action.
#[derive(Debug, Clone)]
pub enum Action {
    // ── Lifecycle ──────────────────────────────────────────────────
    Quit,
    Tick,
    Render,
    Resize(u16, u16),

    // ── Navigation ────────────────────────────────────────────────
    SwitchScreen(ScreenId),

    // ── Data events (from the session via the data bridge) ────────
    DevicesUpdated(Arc<Vec<DeviceEntry>>),
    LedsUpdated(LedsUpdate),
    BusyChanged(bool),
    DiscoveryChanged(DiscoveryState),
    TrackedChanged(Option<WeaveDevice>),
    NoticePosted(Notice),

    // ── User intents ──────────────────────────────────────────────
    /// Track the named device and open its LED panel.
    OpenDevice(String),
    /// Clear everything and rediscover.
    RefreshDevices,
    /// Re-query the tracked device's LED state.
    RefreshLeds,
    /// Optimistically flip one LED and queue the cloud command.
    ToggleLed(usize),
    /// Persist a new target device name from the rename dialog.
    SaveDeviceName(String),

    // ── Overlays ──────────────────────────────────────────────────
    ToggleLicenses,

    // ── Consent gate ──────────────────────────────────────────────
    AcceptTos,
    DeclineTos,
}
