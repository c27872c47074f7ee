// ── LED panel ──
//
// Local mirror of the tracked device's LED list with push-based change
// notification via a `watch` channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::model::Led;

/// What a [`LedsUpdate`] changed, so subscribers can react minimally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedChange {
    /// The whole panel was swapped, typically by a state refresh.
    Replaced { len: usize },
    /// A single LED was appended at `index`.
    Appended { index: usize },
    /// The LED at `index` changed state.
    Updated { index: usize },
    /// The panel was emptied.
    Cleared { removed: usize },
}

/// A panel snapshot plus what changed since the previous one.
#[derive(Debug, Clone)]
pub struct LedsUpdate {
    pub leds: Arc<Vec<Led>>,
    pub change: LedChange,
}

/// The LEDs of the tracked flasher device, as last known locally.
///
/// Holds whatever the most recent state refresh reported, adjusted by
/// optimistic toggles that have not round-tripped yet. Not a cache of
/// truth: a failed remote set leaves the optimistic value in place until
/// the next refresh.
pub struct LedPanel {
    leds: Mutex<Vec<Led>>,
    update: watch::Sender<LedsUpdate>,
}

impl LedPanel {
    #[must_use]
    pub fn new() -> Self {
        let (update, _) = watch::channel(LedsUpdate {
            leds: Arc::new(Vec::new()),
            change: LedChange::Replaced { len: 0 },
        });
        Self {
            leds: Mutex::new(Vec::new()),
            update,
        }
    }

    /// Swap the whole panel for freshly fetched state.
    pub fn replace_all(&self, leds: Vec<Led>) {
        let mut guard = self.lock();
        *guard = leds;
        let change = LedChange::Replaced { len: guard.len() };
        self.notify(&guard, change);
    }

    /// Add one LED to the end of the panel.
    pub fn append(&self, led: Led) {
        let mut guard = self.lock();
        guard.push(led);
        let change = LedChange::Appended {
            index: guard.len() - 1,
        };
        self.notify(&guard, change);
    }

    /// Flip the LED at `index` and return its new state.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; callers render from the same
    /// snapshot they toggle against, so a bad index is a caller bug.
    pub fn toggle(&self, index: usize) -> bool {
        let mut guard = self.lock();
        let on = guard[index].toggle();
        self.notify(&guard, LedChange::Updated { index });
        on
    }

    /// Remove every LED, for when the tracked device goes away.
    pub fn clear(&self) {
        let mut guard = self.lock();
        let removed = guard.len();
        guard.clear();
        self.notify(&guard, LedChange::Cleared { removed });
    }

    /// Copy of the LED at `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Led> {
        self.lock().get(index).copied()
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
    pub fn states(&self) -> Arc<Vec<Led>> {
        self.update.borrow().leds.clone()
    }

    /// Subscribe to panel changes via a `watch::Receiver`.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LedsUpdate> {
        self.update.subscribe()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Vec<Led>> {
        self.leds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a fresh snapshot tagged with what changed.
    fn notify(&self, leds: &[Led], change: LedChange) {
        let snapshot = Arc::new(leds.to_vec());
        // `send_modify` updates unconditionally, even with zero receivers.
        self.update.send_modify(|update| {
            *update = LedsUpdate {
                leds: snapshot,
                change,
            };
        });
    }
}

impl Default for LedPanel {
    fn default() -> Self {
        Self::new()
    }
}
