// ── User-facing notices ──
//
// Transient messages the session wants surfaced to whoever is driving
// it. The CLI prints them; the TUI shows them in the status bar. They
// replace nothing in the tracing output, which stays machine-oriented.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

const NOTICE_CHANNEL_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// One message for the user, timestamped at emission.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Broadcast handle for emitting notices. Cheap to clone; sending with
/// no subscribers is fine, the notice is simply dropped.
#[derive(Clone)]
pub struct NoticeSender {
    tx: broadcast::Sender<Notice>,
}

impl NoticeSender {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Info, message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Error, message.into());
    }

    fn send(&self, level: NoticeLevel, message: String) {
        let _ = self.tx.send(Notice {
            level,
            message,
            at: Utc::now(),
        });
    }
}

impl Default for NoticeSender {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn subscribers_receive_levels_and_messages() {
        let notices = NoticeSender::new();
        let mut rx = notices.subscribe();

        notices.info("hello");
        notices.error("broke");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.level, NoticeLevel::Info);
        assert_eq!(first.message, "hello");

        let second = rx.try_recv().unwrap();
        assert_eq!(second.level, NoticeLevel::Error);
    }

    #[test]
    fn sending_without_subscribers_does_not_panic() {
        let notices = NoticeSender::new();
        notices.warning("nobody listening");
    }
}
