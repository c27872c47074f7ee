//! LED panel screen — one toggle row per LED on the tracked device.

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ledweave_api::WeaveDevice;
use ledweave_core::Led;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph};
use throbber_widgets_tui::{Throbber, ThrobberState};

use crate::action::Action;
use crate::component::Component;
use crate::theme;

pub struct LedsScreen {
    leds: Arc<Vec<Led>>,
    selected: usize,
    tracked: Option<WeaveDevice>,
    /// High while a state query is in flight.
    busy: bool,
    throbber: ThrobberState,
}

impl LedsScreen {
    pub fn new() -> Self {
        Self {
            leds: Arc::new(Vec::new()),
            selected: 0,
            tracked: None,
            busy: false,
            throbber: ThrobberState::default(),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.leds.is_empty() {
            return;
        }
        let last = self.leds.len() as isize - 1;
        self.selected = (self.selected as isize + delta).clamp(0, last) as usize;
    }
}

impl Component for LedsScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_selection(1);
                Ok(None)
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_selection(-1);
                Ok(None)
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                if self.selected < self.leds.len() {
                    Ok(Some(Action::ToggleLed(self.selected)))
                } else {
                    Ok(None)
                }
            }
            KeyCode::Char('r') => Ok(Some(Action::RefreshLeds)),
            _ => Ok(None),
        }
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::LedsUpdated(update) => {
                self.leds = Arc::clone(&update.leds);
                if !self.leds.is_empty() && self.selected >= self.leds.len() {
                    self.selected = self.leds.len() - 1;
                }
            }
            Action::BusyChanged(busy) => {
                self.busy = *busy;
            }
            Action::TrackedChanged(tracked) => {
                self.tracked = tracked.clone();
            }
            Action::Tick => {
                if self.busy {
                    self.throbber.calc_next();
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let title = match &self.tracked {
            Some(device) => format!(" {} ", device.name),
            None => " LED Switches ".to_owned(),
        };
        let block = Block::default()
            .title(title)
            .title_style(theme::title())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let layout = Layout::vertical([
            Constraint::Length(1), // busy indicator
            Constraint::Min(1),    // LED list
            Constraint::Length(1), // hints
        ])
        .split(inner);

        if self.busy {
            let throbber = Throbber::default()
                .label("querying device state…")
                .style(Style::default().fg(theme::AMBER));
            let mut state = self.throbber.clone();
            frame.render_stateful_widget(throbber, layout[0], &mut state);
        }

        if self.tracked.is_none() {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    "  No device acquired. Waiting for the target to appear…",
                    Style::default().fg(theme::GRAY),
                ))),
                layout[1],
            );
        } else if self.leds.is_empty() {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    "  Device reported no LEDs.",
                    Style::default().fg(theme::GRAY),
                ))),
                layout[1],
            );
        } else {
            // LEDs are labeled 1-based on screen, matching the wire index.
            let items: Vec<ListItem> = self
                .leds
                .iter()
                .enumerate()
                .map(|(i, led)| {
                    let glyph = if led.is_on() { "━●" } else { "●━" };
                    let glyph_style = if led.is_on() {
                        theme::led_on()
                    } else {
                        theme::led_off()
                    };
                    let line = Line::from(vec![
                        Span::styled(format!(" LED {:<3}", i + 1), theme::row()),
                        Span::styled(format!(" {glyph} "), glyph_style),
                        Span::styled(led.state_label(), glyph_style),
                    ]);
                    ListItem::new(line)
                })
                .collect();

            let list = List::new(items).highlight_style(theme::selected());
            let mut state = ListState::default().with_selected(Some(self.selected));
            frame.render_stateful_widget(list, layout[1], &mut state);
        }

        let hints = Line::from(vec![
            Span::styled("  j/k ", theme::key_hint_key()),
            Span::styled("navigate  ", theme::key_hint()),
            Span::styled("Space ", theme::key_hint_key()),
            Span::styled("toggle  ", theme::key_hint()),
            Span::styled("r ", theme::key_hint_key()),
            Span::styled("refresh  ", theme::key_hint()),
            Span::styled("Esc ", theme::key_hint_key()),
            Span::styled("back", theme::key_hint()),
        ]);
        frame.render_widget(Paragraph::new(hints), layout[2]);
    }
}
