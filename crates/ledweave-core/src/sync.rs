// ── LED state synchronization ──
//
// Translates between the `_ledflasher` trait's wire schema and the
// local LED panel: decoding state reads, encoding set commands, and
// running both against the capability trait.

use std::sync::Arc;

use ledweave_api::{Command, DeviceState, WeaveApi, WeaveDevice};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::Led;
use crate::notice::NoticeSender;
use crate::store::LedPanel;

// Key paths from the `_ledflasher` trait schema.
pub const LED_FLASHER_COMPONENT: &str = "_ledflasher";
pub const LED_STATES_KEY: &str = "_leds";
pub const SET_LED_COMMAND: &str = "_ledflasher._set";
pub const LED_INDEX_PARAM: &str = "_led";
pub const LED_ON_PARAM: &str = "_on";

/// Extract the per-LED on/off list from a device state tree.
///
/// Devices without the `_ledflasher` component (or without its `_leds`
/// list) yield [`CoreError::MissingLedState`]; a list holding anything
/// but booleans is malformed.
pub fn decode_led_states(state: &DeviceState) -> Result<Vec<bool>, CoreError> {
    let leds = state
        .get_path(LED_FLASHER_COMPONENT, LED_STATES_KEY)
        .and_then(|value| value.as_array())
        .ok_or(CoreError::MissingLedState)?;

    leds.iter()
        .map(|value| {
            value.as_bool().ok_or_else(|| CoreError::MalformedLedState {
                detail: format!("expected boolean in {LED_STATES_KEY}, got {value}"),
            })
        })
        .collect()
}

/// Build the `_ledflasher._set` command for one LED.
///
/// Callers index LEDs from zero; the wire protocol counts from one.
#[must_use]
pub fn set_command(index: usize, on: bool) -> Command {
    Command::new(SET_LED_COMMAND)
        .param(LED_INDEX_PARAM, index + 1)
        .param(LED_ON_PARAM, on)
}

/// Reads and writes the tracked device's LEDs.
///
/// `refresh` replaces the panel with what the device reports and holds
/// the busy flag high while the read is in flight. `set_led` pushes one
/// LED's state to the device and deliberately leaves the panel alone:
/// the caller already flipped it optimistically, and a failed set is
/// only surfaced as a notice, never rolled back.
pub struct LedStateSync {
    api: Arc<dyn WeaveApi>,
    panel: Arc<LedPanel>,
    notices: NoticeSender,
    busy: watch::Sender<bool>,
}

impl LedStateSync {
    pub fn new(api: Arc<dyn WeaveApi>, panel: Arc<LedPanel>, notices: NoticeSender) -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            api,
            panel,
            notices,
            busy,
        }
    }

    /// Subscribe to the busy flag, raised while a refresh is in flight.
    #[must_use]
    pub fn busy(&self) -> watch::Receiver<bool> {
        self.busy.subscribe()
    }

    /// Fetch the device's LED states and replace the panel with them.
    ///
    /// On any failure the panel keeps its previous contents.
    pub async fn refresh(&self, device: &WeaveDevice) -> Result<(), CoreError> {
        self.busy.send_replace(true);
        let result = self.refresh_inner(device).await;
        self.busy.send_replace(false);

        if let Err(err) = &result {
            warn!(device = %device.name, error = %err, "LED state refresh failed");
            self.notices
                .error(format!("Failed to read LED state from \"{}\"", device.name));
        }
        result
    }

    /// Push one LED's state to the device.
    ///
    /// Transport failures, unsuccessful command results, and
    /// result-carried errors all collapse into one outcome: the
    /// operation failed. There is no retry and no panel rollback.
    pub async fn set_led(
        &self,
        device: &WeaveDevice,
        index: usize,
        on: bool,
    ) -> Result<(), CoreError> {
        let command = set_command(index, on);
        debug!(device = %device.name, index, on, "setting LED state");

        let failure = match self.api.execute(&device.id, command).await {
            Ok(result) if result.is_success() => None,
            Ok(result) => Some(match result.error {
                Some(error) => error.to_string(),
                None => format!("command ended in state {:?}", result.state),
            }),
            Err(err) => Some(err.to_string()),
        };

        match failure {
            None => Ok(()),
            Some(message) => {
                warn!(device = %device.name, index, on, "failed to set LED state: {message}");
                self.notices
                    .error(format!("Failed to set LED state on \"{}\"", device.name));
                Err(CoreError::CommandFailed { message })
            }
        }
    }

    // ── Private helpers ──────────────────────────────────────────────

    async fn refresh_inner(&self, device: &WeaveDevice) -> Result<(), CoreError> {
        let state = self.api.get_state(&device.id).await?;
        let states = decode_led_states(&state)?;
        debug!(device = %device.name, leds = states.len(), "LED state refreshed");
        self.panel
            .replace_all(states.into_iter().map(Led::from).collect());
        Ok(())
    }
}
