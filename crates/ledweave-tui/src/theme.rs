//! Palette and semantic styles for the TUI.

use ratatui::style::{Color, Modifier, Style};

// ── Palette ───────────────────────────────────────────────────────────

pub const TEAL: Color = Color::Rgb(94, 234, 212); // #5eead4
pub const AMBER: Color = Color::Rgb(251, 191, 36); // #fbbf24
pub const GREEN: Color = Color::Rgb(74, 222, 128); // #4ade80
pub const RED: Color = Color::Rgb(248, 113, 113); // #f87171
pub const DIM: Color = Color::Rgb(168, 173, 186); // #a8adba
pub const GRAY: Color = Color::Rgb(100, 110, 140); // #646e8c
pub const BG_HIGHLIGHT: Color = Color::Rgb(42, 45, 58); // #2a2d3a

// ── Semantic styles ──────────────────────────────────────────────────

/// Title text for blocks.
pub fn title() -> Style {
    Style::default().fg(TEAL).add_modifier(Modifier::BOLD)
}

/// Border for the active screen block.
pub fn border() -> Style {
    Style::default().fg(GRAY)
}

/// Table header row.
pub fn header() -> Style {
    Style::default()
        .fg(TEAL)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

/// Normal row text.
pub fn row() -> Style {
    Style::default().fg(DIM)
}

/// Selected row.
pub fn selected() -> Style {
    Style::default()
        .fg(AMBER)
        .bg(BG_HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

/// An LED that is on / a positive state word.
pub fn led_on() -> Style {
    Style::default().fg(GREEN).add_modifier(Modifier::BOLD)
}

/// An LED that is off / a muted state word.
pub fn led_off() -> Style {
    Style::default().fg(GRAY)
}

/// Key hint text (e.g., "q quit").
pub fn key_hint() -> Style {
    Style::default().fg(GRAY)
}

/// Key hint key character.
pub fn key_hint_key() -> Style {
    Style::default().fg(TEAL).add_modifier(Modifier::BOLD)
}
