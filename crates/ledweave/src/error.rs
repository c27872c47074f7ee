//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use ledweave_config::ConfigError;
use ledweave_core::CoreError;

/// Exit codes used for process termination.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the Weave cloud: {reason}")]
    #[diagnostic(
        code(ledweave::connection_failed),
        help(
            "Check your network connection and the endpoint URL.\n\
             Try: ledweave --simulate devices to explore offline."
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Cloud request timed out")]
    #[diagnostic(
        code(ledweave::timeout),
        help("Increase the window with --timeout or check cloud responsiveness.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication with the Weave cloud failed: {message}")]
    #[diagnostic(
        code(ledweave::auth_failed),
        help(
            "Verify your access token.\n\
             Set LEDWEAVE_ACCESS_TOKEN or run: ledweave config init"
        )
    )]
    AuthFailed { message: String },

    #[error("The Weave terms of service have not been accepted")]
    #[diagnostic(
        code(ledweave::tos_not_accepted),
        help(
            "Review and accept with: ledweave config accept-tos\n\
             Or pass --simulate to explore without an account."
        )
    )]
    TosNotAccepted,

    // ── Devices & LEDs ───────────────────────────────────────────────

    #[error("Device \"{name}\" not found")]
    #[diagnostic(
        code(ledweave::device_not_found),
        help(
            "Run: ledweave devices to see what the cloud reports.\n\
             Change the target with: ledweave config set-device <name>"
        )
    )]
    DeviceNotFound { name: String },

    #[error("LED index {index} is out of range (device reports {count} LEDs)")]
    #[diagnostic(
        code(ledweave::led_out_of_range),
        help("Indexes are 0-based; run: ledweave leds to see the panel.")
    )]
    LedOutOfRange { index: usize, count: usize },

    #[error("Unusable LED state from the device: {detail}")]
    #[diagnostic(
        code(ledweave::bad_led_state),
        help("The target device may not expose the LED flasher component.")
    )]
    BadLedState { detail: String },

    // ── Cloud ────────────────────────────────────────────────────────

    #[error("Cloud command failed: {message}")]
    #[diagnostic(code(ledweave::command_failed))]
    CommandFailed { message: String },

    #[error("Cloud API error: {message}")]
    #[diagnostic(code(ledweave::api_error))]
    Api { message: String },

    // ── Configuration & usage ────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ledweave::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(ledweave::config))]
    Config(#[from] ConfigError),

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::Config(ConfigError::NoCredentials) => exit_code::AUTH,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::LedOutOfRange { .. }
            | Self::Validation { .. }
            | Self::Config(ConfigError::Validation { .. }) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed { reason },

            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },

            CoreError::Timeout => Self::Timeout,

            CoreError::SessionClosed => Self::Api {
                message: "the session closed while a command was in flight".into(),
            },

            CoreError::DeviceNotFound { identifier } => Self::DeviceNotFound { name: identifier },

            // The CLI acquires a target before issuing commands, so this
            // only fires when the device drops out mid-command.
            CoreError::NoTrackedDevice => Self::DeviceNotFound {
                name: "(tracked device lost)".into(),
            },

            CoreError::MissingLedState => Self::BadLedState {
                detail: "device state carries no LED list".into(),
            },

            CoreError::MalformedLedState { detail } => Self::BadLedState { detail },

            CoreError::CommandFailed { message } => Self::CommandFailed { message },

            CoreError::Api {
                message,
                code,
                status: _,
            } => Self::Api {
                message: match code {
                    Some(code) => format!("{message} ({code})"),
                    None => message,
                },
            },

            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => Self::Api { message },
        }
    }
}
