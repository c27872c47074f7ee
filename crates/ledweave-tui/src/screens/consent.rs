//! Consent screen — blocks cloud access until the terms are accepted.

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::action::Action;
use crate::component::Component;
use crate::theme;

pub struct ConsentScreen;

impl ConsentScreen {
    pub fn new() -> Self {
        Self
    }
}

impl Component for ConsentScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Char('y' | 'a') | KeyCode::Enter => Ok(Some(Action::AcceptTos)),
            KeyCode::Char('n' | 'q') | KeyCode::Esc => Ok(Some(Action::DeclineTos)),
            _ => Ok(None),
        }
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let width = 64u16.min(area.width.saturating_sub(4));
        let height = 14u16.min(area.height.saturating_sub(2));
        let x = (area.width.saturating_sub(width)) / 2;
        let y = (area.height.saturating_sub(height)) / 2;
        let modal = Rect::new(area.x + x, area.y + y, width, height);

        let block = Block::default()
            .title(" Terms of Service ")
            .title_style(theme::title())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border());
        let inner = block.inner(modal);
        frame.render_widget(block, modal);

        let layout = Layout::vertical([
            Constraint::Min(1),    // terms text
            Constraint::Length(1), // choices
        ])
        .split(inner);

        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                " This tool talks to your devices through the Weave cloud",
                theme::row(),
            )),
            Line::from(Span::styled(
                " service. Device names, state, and the commands you issue",
                theme::row(),
            )),
            Line::from(Span::styled(
                " are sent to and processed by that service, subject to its",
                theme::row(),
            )),
            Line::from(Span::styled(
                " terms of service and privacy policy.",
                theme::row(),
            )),
            Line::from(""),
            Line::from(Span::styled(
                " Your acceptance is stored in the local config file and",
                theme::row(),
            )),
            Line::from(Span::styled(
                " can be revoked by editing it.",
                theme::row(),
            )),
        ];
        frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), layout[0]);

        let choices = Line::from(vec![
            Span::styled("  y ", theme::key_hint_key()),
            Span::styled("accept   ", theme::key_hint()),
            Span::styled("n ", theme::key_hint_key()),
            Span::styled("decline and quit", theme::key_hint()),
        ]);
        frame.render_widget(Paragraph::new(choices), layout[1]);
    }
}
