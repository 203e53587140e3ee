use thiserror::Error;

/// Failures of the token lifecycle. `Unconfigured` is the normal state of a
/// fresh install and callers are expected to render it, not report it.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("credentials are not configured")]
    Unconfigured,

    #[error("token endpoint rejected refresh: {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed token response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Still 401 after one refresh-and-retry.
    #[error("unauthorized after token refresh")]
    Unauthorized,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote error {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("rate_limited: retry_after={retry_after:?}")]
    RateLimited { retry_after: Option<u64> },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unconfigured(&self) -> bool {
        matches!(self, ApiError::Auth(AuthError::Unconfigured))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("settings not yet available after {waited_ms}ms")]
    NotYetAvailable { waited_ms: u64 },
}
