use thiserror::Error;

/// Top-level error type for the `ledweave-api` crate.
///
/// Covers every failure mode of the cloud surface: authentication,
/// transport, structured cloud errors, and response decoding.
/// `ledweave-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Access token rejected (401/403 from the cloud).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Access token is not a valid header value.
    #[error("Invalid access token")]
    InvalidAccessToken,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Cloud ───────────────────────────────────────────────────────
    /// Structured error from the cloud (parsed from the `{error: {...}}`
    /// envelope).
    #[error("Cloud error (HTTP {status}): {message}")]
    Cloud {
        message: String,
        code: Option<String>,
        status: u16,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the access token was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::InvalidAccessToken
        )
    }

    /// Returns `true` if this is a transient error a later attempt might
    /// clear. Nothing here retries; callers use this to phrase notices.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Cloud { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Cloud { status: 404, .. } => true,
            _ => false,
        }
    }
}
