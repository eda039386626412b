/// Application name
pub const APP_NAME: &str = "Hearth";

/// Default REST API base URL
pub const DEFAULT_API_URL: &str = "https://api.hearth.chat";

/// Reconnect backoff base delay in milliseconds (first retry waits this long)
pub const RECONNECT_BASE_DELAY_MS: u64 = 250;

/// Reconnect backoff ceiling in milliseconds
pub const RECONNECT_MAX_DELAY_MS: u64 = 60_000;

/// Persistence debounce window in milliseconds
pub const PERSIST_DEBOUNCE_MS: u64 = 500;

/// Messages requested per history page
pub const HISTORY_PAGE_SIZE: u32 = 50;

/// Gateway keepalive ping interval in seconds
pub const PING_INTERVAL_SECS: u64 = 30;

/// Upper bound on cached message ids per channel before the oldest are dropped
pub const MAX_CACHED_MESSAGES_PER_CHANNEL: usize = 1_000;
