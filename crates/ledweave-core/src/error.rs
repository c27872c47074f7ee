// ── Core error types ──
//
// User-facing errors from ledweave-core. These are NOT API-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<ledweave_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the Weave cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cloud request timed out")]
    Timeout,

    #[error("Session closed")]
    SessionClosed,

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("No target device acquired yet")]
    NoTrackedDevice,

    // ── LED state errors ─────────────────────────────────────────────
    #[error("Device state carries no LED list")]
    MissingLedState,

    #[error("Device LED state is malformed: {detail}")]
    MalformedLedState { detail: String },

    #[error("LED command failed: {message}")]
    CommandFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// The cloud's error code (e.g. "NOT_FOUND"), when it sent one.
        code: Option<String>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ledweave_api::Error> for CoreError {
    fn from(err: ledweave_api::Error) -> Self {
        match err {
            ledweave_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ledweave_api::Error::InvalidAccessToken => CoreError::AuthenticationFailed {
                message: "Access token rejected by the cloud".into(),
            },
            ledweave_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else if e.status().map(|s| s.as_u16()) == Some(404) {
                    CoreError::DeviceNotFound {
                        identifier: e.url().map(|u| u.path().to_string()).unwrap_or_default(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ledweave_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ledweave_api::Error::Cloud {
                message,
                code,
                status,
            } => CoreError::Api {
                message,
                code,
                status: Some(status),
            },
            ledweave_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
