//! Hub API error types.

/// Failures talking to the hub's REST API.
#[derive(Debug, thiserror::Error)]
pub enum HubApiError {
    /// Transport-level failure (connection refused, TLS, timeout).
    #[error("hub request failed")]
    Transport(#[from] reqwest::Error),

    /// The hub rejected the configured access token.
    #[error("hub rejected the access token")]
    Unauthorized,

    /// Any other non-success response.
    #[error("hub returned status {status}")]
    Status { status: u16 },

    /// The base URL in the configuration is malformed.
    #[error("invalid hub base url: {0}")]
    InvalidBaseUrl(String),
}
