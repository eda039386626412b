use thiserror::Error;

use hearth_net::NetError;
use hearth_store::StoreError;

/// Errors surfaced by the sync engine to its caller.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Network error: {0}")]
    Net(#[from] NetError),

    /// No session token is stored.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The message could not be delivered; the placeholder was dropped.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The server rejected the session; everything was signed out.
    #[error("Session invalidated")]
    SessionInvalidated,

    /// The session was signed out while the call was running.
    #[error("Signed out")]
    SignedOut,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
