//! Screen components.

mod consent;
mod devices;
mod leds;

pub use consent::ConsentScreen;
pub use devices::DevicesScreen;
pub use leds::LedsScreen;
