// ── Reactive state stores ──
//
// Each store is the single source of truth for one slice of session
// state and pushes change notification via `watch` channels.

pub mod devices;
pub mod leds;
pub mod manifests;

pub use devices::{DeviceDirectory, DeviceEntry};
pub use leds::{LedChange, LedPanel, LedsUpdate};
pub use manifests::ManifestCache;
