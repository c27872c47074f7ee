//! Shared helpers for command handlers.

use std::time::Duration;

use indicatif::ProgressBar;
use owo_colors::OwoColorize;

/// Spinner shown on stderr during cloud round-trips.
///
/// Hidden in quiet mode; indicatif suppresses drawing on its own when
/// stderr is not a terminal.
pub fn spinner(message: String, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// "on"/"off", tinted when color output is enabled.
pub fn state_word(on: bool, colored: bool) -> String {
    match (on, colored) {
        (true, true) => "on".green().to_string(),
        (false, true) => "off".dimmed().to_string(),
        (true, false) => "on".to_owned(),
        (false, false) => "off".to_owned(),
    }
}
