//! Connection state published by the session.

use std::fmt;

/// Lifecycle of the gateway connection. `SignedOut` is terminal until the
/// next sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    SignedOut,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::SignedOut => "signed-out",
        };
        f.write_str(s)
    }
}
