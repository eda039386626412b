use thiserror::Error;

/// Errors produced by the REST, gateway and file-storage clients.
#[derive(Error, Debug)]
pub enum NetError {
    /// Transport-level HTTP failure (DNS, TLS, connection reset...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// WebSocket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A response body did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// An authenticated call was made without a session token.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The server has no file-storage service configured.
    #[error("File storage unavailable")]
    NoFileStorage,

    /// The gateway connection is gone.
    #[error("Connection closed")]
    Closed,
}

impl NetError {
    /// Whether the server rejected the session token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, NetError::Status { status: 401, .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
