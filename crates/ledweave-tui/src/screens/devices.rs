//! Device list screen — discovered devices with a rename-target dialog.

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ledweave_core::DeviceEntry;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Clear, Paragraph, Row, Table, TableState};
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;

use crate::action::Action;
use crate::component::Component;
use crate::theme;

pub struct DevicesScreen {
    devices: Arc<Vec<DeviceEntry>>,
    table_state: TableState,
    /// Name of the device currently tracked for LED control.
    tracked_name: Option<String>,
    /// Rename dialog state; `Some` while the editor is open.
    rename: Option<Input>,
    /// Configured target name, used to prefill the rename dialog.
    target_name: String,
}

impl DevicesScreen {
    pub fn new(target_name: String) -> Self {
        Self {
            devices: Arc::new(Vec::new()),
            table_state: TableState::default(),
            tracked_name: None,
            rename: None,
            target_name,
        }
    }

    fn selected_index(&self) -> usize {
        self.table_state.selected().unwrap_or(0)
    }

    fn selected_entry(&self) -> Option<&DeviceEntry> {
        self.devices.get(self.selected_index())
    }

    fn move_selection(&mut self, delta: isize) {
        if self.devices.is_empty() {
            return;
        }
        let last = self.devices.len() as isize - 1;
        let next = (self.selected_index() as isize + delta).clamp(0, last);
        self.table_state.select(Some(next as usize));
    }

    fn handle_rename_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc => {
                self.rename = None;
                None
            }
            KeyCode::Enter => {
                let name = self.rename.take()?.value().trim().to_owned();
                if name.is_empty() {
                    None
                } else {
                    Some(Action::SaveDeviceName(name))
                }
            }
            _ => {
                if let Some(input) = self.rename.as_mut() {
                    input.handle_event(&crossterm::event::Event::Key(key));
                }
                None
            }
        }
    }

    fn render_rename_dialog(&self, frame: &mut Frame, area: Rect, input: &Input) {
        let width = 46u16.min(area.width.saturating_sub(4));
        let x = (area.width.saturating_sub(width)) / 2;
        let y = area.height / 2;
        let dialog = Rect::new(area.x + x, area.y + y.saturating_sub(2), width, 3);

        frame.render_widget(Clear, dialog);
        let block = Block::default()
            .title(" Target device name ")
            .title_style(theme::title())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border());
        let inner = block.inner(dialog);
        frame.render_widget(block, dialog);

        let scroll = input.visual_scroll(inner.width.saturating_sub(1) as usize);
        frame.render_widget(
            Paragraph::new(input.value())
                .style(theme::row())
                .scroll((0, scroll as u16)),
            inner,
        );
        let cursor_x = (input.visual_cursor().saturating_sub(scroll)) as u16;
        frame.set_cursor_position((inner.x + cursor_x, inner.y));
    }
}

impl Component for DevicesScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.rename.is_some() {
            return Ok(self.handle_rename_key(key));
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_selection(1);
                Ok(None)
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_selection(-1);
                Ok(None)
            }
            KeyCode::Char('g') => {
                self.table_state.select(Some(0));
                Ok(None)
            }
            KeyCode::Char('G') => {
                if !self.devices.is_empty() {
                    self.table_state.select(Some(self.devices.len() - 1));
                }
                Ok(None)
            }
            KeyCode::Enter => Ok(self
                .selected_entry()
                .map(|entry| Action::OpenDevice(entry.device.name.clone()))),
            KeyCode::Char('r') => Ok(Some(Action::RefreshDevices)),
            KeyCode::Char('n') => {
                self.rename = Some(Input::default().with_value(self.target_name.clone()));
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::DevicesUpdated(devices) => {
                self.devices = Arc::clone(devices);
                if !self.devices.is_empty() && self.selected_index() >= self.devices.len() {
                    self.table_state.select(Some(self.devices.len() - 1));
                }
            }
            Action::TrackedChanged(tracked) => {
                self.tracked_name = tracked.as_ref().map(|device| device.name.clone());
            }
            Action::OpenDevice(name) | Action::SaveDeviceName(name) => {
                self.target_name = name.clone();
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let title = format!(" Devices ({}) ", self.devices.len());
        let block = Block::default()
            .title(title)
            .title_style(theme::title())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let layout = Layout::vertical([
            Constraint::Min(1),    // table
            Constraint::Length(1), // hints
        ])
        .split(inner);

        if self.devices.is_empty() {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    "  Listening for devices…",
                    Style::default().fg(theme::GRAY),
                ))),
                layout[0],
            );
        } else {
            let header = Row::new(vec![
                Cell::from(" ").style(theme::header()),
                Cell::from("Name").style(theme::header()),
                Cell::from("Model").style(theme::header()),
                Cell::from("Transport").style(theme::header()),
                Cell::from("Description").style(theme::header()),
            ]);

            let rows: Vec<Row> = self
                .devices
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    let is_selected = i == self.selected_index();
                    let is_tracked = self.tracked_name.as_deref() == Some(&entry.device.name);

                    let marker = if is_tracked { "●" } else { " " };
                    let transport = match (
                        entry.device.discovery_transport.has_cloud(),
                        entry.device.discovery_transport.has_local(),
                    ) {
                        (true, true) => "cloud+local",
                        (true, false) => "cloud",
                        (false, true) => "local only",
                        (false, false) => "unreachable",
                    };
                    let description = entry.device.description.as_deref().unwrap_or("─");

                    Row::new(vec![
                        Cell::from(marker).style(theme::led_on()),
                        Cell::from(entry.device.name.clone()).style(Style::default().fg(theme::TEAL)),
                        Cell::from(entry.model_name().to_owned()),
                        Cell::from(transport).style(if entry.device.discovery_transport.has_cloud() {
                            theme::row()
                        } else {
                            theme::led_off()
                        }),
                        Cell::from(description.to_owned()),
                    ])
                    .style(if is_selected {
                        theme::selected()
                    } else {
                        theme::row()
                    })
                })
                .collect();

            let widths = [
                Constraint::Length(1),
                Constraint::Min(16),
                Constraint::Length(20),
                Constraint::Length(12),
                Constraint::Min(12),
            ];
            let table = Table::new(rows, widths)
                .header(header)
                .row_highlight_style(theme::selected());

            let mut state = self.table_state.clone();
            frame.render_stateful_widget(table, layout[0], &mut state);
        }

        let hints = Line::from(vec![
            Span::styled("  j/k ", theme::key_hint_key()),
            Span::styled("navigate  ", theme::key_hint()),
            Span::styled("Enter ", theme::key_hint_key()),
            Span::styled("open  ", theme::key_hint()),
            Span::styled("r ", theme::key_hint_key()),
            Span::styled("refresh  ", theme::key_hint()),
            Span::styled("n ", theme::key_hint_key()),
            Span::styled("rename target  ", theme::key_hint()),
            Span::styled("L ", theme::key_hint_key()),
            Span::styled("licenses", theme::key_hint()),
        ]);
        frame.render_widget(Paragraph::new(hints), layout[1]);

        if let Some(input) = &self.rename {
            self.render_rename_dialog(frame, area, input);
        }
    }

    fn capturing_input(&self) -> bool {
        self.rename.is_some()
    }
}
