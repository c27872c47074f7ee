//! Local models layered on top of the wire types.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── LED ─────────────────────────────────────────────────────────────────────

/// A single LED on a flasher device, as last known locally.
///
/// The panel mirrors the device's `_leds` list. An entry is flipped
/// optimistically when the user toggles it and replaced wholesale when a
/// state refresh completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Led {
    on: bool,
}

impl Led {
    #[must_use]
    pub fn new(on: bool) -> Self {
        Self { on }
    }

    #[must_use]
    pub fn is_on(self) -> bool {
        self.on
    }

    pub fn set(&mut self, on: bool) {
        self.on = on;
    }

    /// Flips the LED and returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.on = !self.on;
        self.on
    }

    /// Human-readable state, matching what flasher devices report.
    #[must_use]
    pub fn state_label(self) -> &'static str {
        if self.on { "on" } else { "off" }
    }
}

impl From<bool> for Led {
    fn from(on: bool) -> Self {
        Self::new(on)
    }
}

impl fmt::Display for Led {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_label())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_toggle_flips_and_reports_new_state() {
        let mut led = Led::new(false);
        assert!(led.toggle());
        assert!(led.is_on());
        assert!(!led.toggle());
        assert!(!led.is_on());
    }

    #[test]
    fn test_state_label() {
        assert_eq!(Led::new(true).state_label(), "on");
        assert_eq!(Led::new(false).state_label(), "off");
        assert_eq!(Led::new(true).to_string(), "on");
    }

    #[test]
    fn test_serializes_as_bare_bool() {
        let led = Led::new(true);
        assert_eq!(serde_json::to_string(&led).unwrap(), "true");
        let back: Led = serde_json::from_str("false").unwrap();
        assert!(!back.is_on());
    }
}
