//! Screen identifiers.

use std::fmt;

/// Identifies each TUI screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScreenId {
    /// Terms-of-service gate, shown until the user accepts.
    Consent,
    /// Discovered device list.
    #[default]
    Devices,
    /// Per-device LED toggle panel.
    Leds,
}

impl ScreenId {
    /// Title shown in the screen's border block.
    pub fn label(self) -> &'static str {
        match self {
            Self::Consent => "Terms of Service",
            Self::Devices => "Devices",
            Self::Leds => "LED Switches",
        }
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
