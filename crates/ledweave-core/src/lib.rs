//! Reactive glue between `ledweave-api` and UI consumers (CLI / TUI).
//!
//! This crate owns the business logic and reactive state infrastructure
//! for the ledweave workspace:
//!
//! - **[`WeaveSession`]** — Central facade managing the full lifecycle:
//!   [`start()`](WeaveSession::start) spawns the request processor and
//!   target tracker, then begins discovery for the configured device.
//!   [`WeaveSession::oneshot()`](WeaveSession::oneshot) provides a
//!   lightweight mode for single CLI invocations.
//!
//! - **Stores** ([`store`]) — [`DeviceDirectory`] keeps discovered
//!   devices in first-seen order; [`LedPanel`] mirrors the tracked
//!   device's LEDs; [`ManifestCache`] memoizes model manifests. All
//!   push snapshots through `tokio::sync::watch` channels.
//!
//! - **[`DiscoverySession`]** — Folds the capability trait's discovery
//!   feed into the directory and watches it for the target device,
//!   emitting [`TargetEvent`]s at most once per acquisition.
//!
//! - **[`LedStateSync`]** — Translates between the `_ledflasher` wire
//!   schema and the local panel: state reads replace the panel
//!   wholesale, LED sets go out as cloud commands with no rollback of
//!   the optimistic local flip.
//!
//! - **[`Notice`]** — Transient user-facing messages (connection made,
//!   command failed) over a `broadcast` channel, separate from the
//!   `tracing` output.

pub mod discovery;
pub mod error;
pub mod model;
pub mod notice;
pub mod session;
pub mod store;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use discovery::{DiscoverySession, DiscoveryState, TargetEvent, TargetFilter};
pub use error::CoreError;
pub use model::Led;
pub use notice::{Notice, NoticeLevel, NoticeSender};
pub use session::WeaveSession;
pub use store::{DeviceDirectory, DeviceEntry, LedChange, LedPanel, LedsUpdate, ManifestCache};
pub use sync::LedStateSync;
