//! Application core — event loop, screen management, action dispatch.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ledweave_api::WeaveDevice;
use ledweave_config::{Preferences, load_config_file, save_config_to};
use ledweave_core::{DiscoveryState, Notice, NoticeLevel, WeaveSession};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::component::Component;
use crate::data_bridge::run_data_bridge;
use crate::event::{Event, EventReader};
use crate::screen::ScreenId;
use crate::screens::{ConsentScreen, DevicesScreen, LedsScreen};
use crate::theme;
use crate::tui::Tui;

/// How long a notice stays in the status bar.
const NOTICE_TTL: Duration = Duration::from_secs(5);

/// Third-party licenses shown in the `L` overlay.
const LICENSES: &[(&str, &str)] = &[
    ("ratatui", "MIT"),
    ("crossterm", "MIT"),
    ("tui-input", "MIT"),
    ("throbber-widgets-tui", "MIT"),
    ("tokio", "MIT"),
    ("reqwest", "MIT OR Apache-2.0"),
    ("serde", "MIT OR Apache-2.0"),
    ("figment", "MIT OR Apache-2.0"),
    ("tracing", "MIT"),
    ("clap", "MIT OR Apache-2.0"),
    ("color-eyre", "MIT OR Apache-2.0"),
    ("chrono", "MIT OR Apache-2.0"),
];

/// Top-level application state and event loop.
pub struct App {
    session: WeaveSession,
    prefs: Arc<Preferences>,
    config_path: PathBuf,

    active_screen: ScreenId,
    screens: HashMap<ScreenId, Box<dyn Component>>,
    running: bool,
    /// Whether the session and data bridge have been started. Stays
    /// false while the consent gate is up.
    started: bool,

    // Status bar state, fed by the data bridge.
    discovery: DiscoveryState,
    tracked: Option<WeaveDevice>,
    busy: bool,
    notice: Option<(Notice, Instant)>,
    licenses_visible: bool,

    bridge_cancel: CancellationToken,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
}

impl App {
    pub fn new(session: WeaveSession, prefs: Arc<Preferences>, config_path: PathBuf) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();

        let target_name = prefs.current_device_name();
        let mut screens: HashMap<ScreenId, Box<dyn Component>> = HashMap::new();
        screens.insert(ScreenId::Consent, Box::new(ConsentScreen::new()));
        screens.insert(ScreenId::Devices, Box::new(DevicesScreen::new(target_name)));
        screens.insert(ScreenId::Leds, Box::new(LedsScreen::new()));

        let active_screen = if prefs.is_tos_accepted() {
            ScreenId::Devices
        } else {
            ScreenId::Consent
        };

        Self {
            session,
            prefs,
            config_path,
            active_screen,
            screens,
            running: true,
            started: false,
            discovery: DiscoveryState::Idle,
            tracked: None,
            busy: false,
            notice: None,
            licenses_visible: false,
            bridge_cancel: CancellationToken::new(),
            action_tx,
            action_rx,
        }
    }

    /// Run the main event loop.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;

        for screen in self.screens.values_mut() {
            screen.init(self.action_tx.clone())?;
        }

        if self.active_screen != ScreenId::Consent {
            self.start_session();
        }

        let mut events = EventReader::new(
            Duration::from_millis(250), // notice expiry + throbber
            Duration::from_millis(33),  // ~30 FPS render
        );

        info!("TUI event loop started");

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };

            match event {
                Event::Key(key) => {
                    if let Some(action) = self.handle_key_event(key)? {
                        self.action_tx.send(action)?;
                    }
                }
                Event::Resize(w, h) => self.action_tx.send(Action::Resize(w, h))?,
                Event::Tick => self.action_tx.send(Action::Tick)?,
                Event::Render => self.action_tx.send(Action::Render)?,
            }

            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(&action)?;

                if let Action::Render = action {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        events.stop();
        self.bridge_cancel.cancel();
        self.session.shutdown().await;
        info!("TUI event loop ended");
        Ok(())
    }

    /// Spawn the data bridge and start the session in the background.
    fn start_session(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        tokio::spawn(run_data_bridge(
            self.session.clone(),
            self.action_tx.clone(),
            self.bridge_cancel.clone(),
        ));

        let session = self.session.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            if let Err(err) = session.start().await {
                warn!(error = %err, "session start failed");
                let _ = tx.send(Action::NoticePosted(Notice {
                    level: NoticeLevel::Error,
                    message: format!("Failed to start: {err}"),
                    at: Utc::now(),
                }));
            }
        });
    }

    /// Map a key event to an action. Global keys are handled here;
    /// screen-specific keys are delegated to the active screen.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        // An open editor gets every key verbatim.
        if self
            .screens
            .get(&self.active_screen)
            .is_some_and(|screen| screen.capturing_input())
        {
            if let Some(screen) = self.screens.get_mut(&self.active_screen) {
                return screen.handle_key_event(key);
            }
        }

        if self.licenses_visible {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('L' | 'q') => Ok(Some(Action::ToggleLicenses)),
                _ => Ok(None),
            };
        }

        // The consent gate owns all its keys (q means decline there).
        if self.active_screen != ScreenId::Consent {
            match (key.modifiers, key.code) {
                (KeyModifiers::CONTROL, KeyCode::Char('c'))
                | (KeyModifiers::NONE, KeyCode::Char('q')) => return Ok(Some(Action::Quit)),

                (_, KeyCode::Char('L')) => return Ok(Some(Action::ToggleLicenses)),

                (KeyModifiers::NONE, KeyCode::Esc) if self.active_screen == ScreenId::Leds => {
                    return Ok(Some(Action::SwitchScreen(ScreenId::Devices)));
                }

                _ => {}
            }
        }

        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            return screen.handle_key_event(key);
        }
        Ok(None)
    }

    /// Process a single action — update app state and propagate to screens.
    fn process_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Quit => {
                self.running = false;
            }

            Action::Render | Action::Resize(..) => {}

            Action::Tick => {
                if let Some((_, since)) = &self.notice {
                    if since.elapsed() >= NOTICE_TTL {
                        self.notice = None;
                    }
                }
                self.forward_to_screens(action)?;
            }

            Action::SwitchScreen(target) => {
                if *target != self.active_screen {
                    debug!("switching screen: {} → {}", self.active_screen, target);
                    self.active_screen = *target;
                }
            }

            Action::ToggleLicenses => {
                self.licenses_visible = !self.licenses_visible;
            }

            Action::DiscoveryChanged(state) => {
                self.discovery = *state;
            }

            Action::BusyChanged(busy) => {
                self.busy = *busy;
                self.forward_to_screens(action)?;
            }

            Action::TrackedChanged(tracked) => {
                self.tracked = tracked.clone();
                // The tracked device went away; its panel is gone too.
                if tracked.is_none() && self.active_screen == ScreenId::Leds {
                    self.action_tx.send(Action::SwitchScreen(ScreenId::Devices))?;
                }
                self.forward_to_screens(action)?;
            }

            Action::NoticePosted(notice) => {
                self.notice = Some((notice.clone(), Instant::now()));
            }

            Action::OpenDevice(name) => {
                // Retarget the live session; if the device is already
                // tracked the watch won't fire, so refresh directly.
                let already_tracked = self
                    .tracked
                    .as_ref()
                    .is_some_and(|device| device.name == *name);
                self.prefs.set_device_name(name.clone());
                if already_tracked {
                    self.spawn_refresh_leds();
                }
                self.action_tx.send(Action::SwitchScreen(ScreenId::Leds))?;
                self.forward_to_screens(action)?;
            }

            Action::RefreshDevices => {
                let session = self.session.clone();
                tokio::spawn(async move {
                    if let Err(err) = session.refresh_devices().await {
                        warn!(error = %err, "device refresh failed");
                    }
                });
            }

            Action::RefreshLeds => self.spawn_refresh_leds(),

            Action::ToggleLed(index) => {
                if let Err(err) = self.session.toggle_led(*index) {
                    self.show_notice(NoticeLevel::Error, format!("Toggle failed: {err}"));
                }
            }

            Action::SaveDeviceName(name) => {
                self.prefs.set_device_name(name.clone());
                let saved = self.persist_config(|config| config.device_name = name.clone());
                match saved {
                    Ok(()) => {
                        self.show_notice(NoticeLevel::Info, format!("Target device: \"{name}\""));
                    }
                    Err(err) => {
                        self.show_notice(NoticeLevel::Error, format!("Could not save: {err}"));
                    }
                }
                self.forward_to_screens(action)?;
            }

            Action::AcceptTos => {
                self.prefs.set_tos_accepted(true);
                if let Err(err) = self.persist_config(|config| config.tos_accepted = true) {
                    self.show_notice(NoticeLevel::Warning, format!("Could not save: {err}"));
                }
                self.action_tx.send(Action::SwitchScreen(ScreenId::Devices))?;
                self.start_session();
            }

            Action::DeclineTos => {
                info!("terms declined, exiting");
                self.running = false;
            }

            // Everything else is screen data.
            other => self.forward_to_screens(other)?,
        }

        Ok(())
    }

    fn forward_to_screens(&mut self, action: &Action) -> Result<()> {
        for screen in self.screens.values_mut() {
            if let Some(follow_up) = screen.update(action)? {
                self.action_tx.send(follow_up)?;
            }
        }
        Ok(())
    }

    fn spawn_refresh_leds(&self) {
        let session = self.session.clone();
        tokio::spawn(async move {
            if let Err(err) = session.refresh_leds().await {
                warn!(error = %err, "LED refresh failed");
            }
        });
    }

    fn show_notice(&mut self, level: NoticeLevel, message: String) {
        self.notice = Some((
            Notice {
                level,
                message,
                at: Utc::now(),
            },
            Instant::now(),
        ));
    }

    /// Read-modify-write the config file, leaving ambient environment
    /// overrides out of the persisted result.
    fn persist_config(
        &self,
        mutate: impl FnOnce(&mut ledweave_config::Config),
    ) -> Result<(), ledweave_config::ConfigError> {
        let mut config = load_config_file(&self.config_path)?;
        mutate(&mut config);
        save_config_to(&self.config_path, &config)
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let layout = Layout::vertical([
            Constraint::Min(1),    // screen content
            Constraint::Length(1), // status bar
        ])
        .split(area);

        if let Some(screen) = self.screens.get(&self.active_screen) {
            screen.render(frame, layout[0]);
        }

        self.render_status_bar(frame, layout[1]);

        if self.licenses_visible {
            self.render_licenses_overlay(frame, area);
        }
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let discovery = match self.discovery {
            DiscoveryState::Discovering => {
                Span::styled("● discovering", Style::default().fg(theme::AMBER))
            }
            DiscoveryState::Idle => Span::styled("○ idle", Style::default().fg(theme::GRAY)),
        };

        let tracked = match &self.tracked {
            Some(device) => Span::styled(
                format!("  {}", device.name),
                Style::default().fg(theme::TEAL),
            ),
            None => Span::styled("  no device", Style::default().fg(theme::GRAY)),
        };

        let mut spans = vec![Span::raw(" "), discovery, tracked];

        if self.busy {
            spans.push(Span::styled("  ⋯", Style::default().fg(theme::AMBER)));
        }

        if let Some((notice, _)) = &self.notice {
            let color = match notice.level {
                NoticeLevel::Info => theme::GREEN,
                NoticeLevel::Warning => theme::AMBER,
                NoticeLevel::Error => theme::RED,
            };
            spans.push(Span::styled(
                format!("  │ {}", notice.message),
                Style::default().fg(color),
            ));
        } else {
            spans.push(Span::styled("  │ q quit", theme::key_hint()));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_licenses_overlay(&self, frame: &mut Frame, area: Rect) {
        let width = 48u16.min(area.width.saturating_sub(4));
        let height = (LICENSES.len() as u16 + 4).min(area.height.saturating_sub(2));
        let x = (area.width.saturating_sub(width)) / 2;
        let y = (area.height.saturating_sub(height)) / 2;
        let overlay = Rect::new(area.x + x, area.y + y, width, height);

        frame.render_widget(Clear, overlay);
        let block = Block::default()
            .title(" Open Source Licenses ")
            .title_style(theme::title())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border());
        let inner = block.inner(overlay);
        frame.render_widget(block, overlay);

        let mut lines = vec![Line::from("")];
        for (name, license) in LICENSES {
            lines.push(Line::from(vec![
                Span::styled(format!("  {name:<24}"), Style::default().fg(theme::TEAL)),
                Span::styled(*license, theme::row()),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  Esc to close",
            theme::key_hint(),
        )));

        frame.render_widget(Paragraph::new(lines), inner);
    }
}
