//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client starts with zero
//! configuration against the public instance.

use std::path::PathBuf;
use std::time::Duration;

use hearth_shared::constants::{
    DEFAULT_API_URL, HISTORY_PAGE_SIZE, PERSIST_DEBOUNCE_MS, PING_INTERVAL_SECS,
    RECONNECT_BASE_DELAY_MS, RECONNECT_MAX_DELAY_MS,
};

use crate::backoff::Backoff;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST API base URL.
    /// Env: `HEARTH_API_URL`
    pub api_url: String,

    /// Gateway URL to use instead of the one advertised by the API.
    /// Env: `HEARTH_WS_URL`
    pub ws_url_override: Option<String>,

    /// Directory holding the local database. `None` uses the platform
    /// data directory.
    /// Env: `HEARTH_DATA_DIR`
    pub data_dir: Option<PathBuf>,

    /// How long store changes are coalesced before being written.
    /// Env: `HEARTH_PERSIST_DEBOUNCE_MS`
    pub persist_debounce_ms: u64,

    /// First reconnect delay; doubles on every further failure.
    pub reconnect_base_delay_ms: u64,

    /// Reconnect delay ceiling. `None` lets the delay grow without bound.
    /// Env: `HEARTH_RECONNECT_MAX_MS` (`0` disables the ceiling)
    pub reconnect_max_delay_ms: Option<u64>,

    /// Messages per history page.
    /// Env: `HEARTH_HISTORY_PAGE_SIZE`
    pub history_page_size: u32,

    /// Gateway keepalive interval.
    pub ping_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url_override: None,
            data_dir: None,
            persist_debounce_ms: PERSIST_DEBOUNCE_MS,
            reconnect_base_delay_ms: RECONNECT_BASE_DELAY_MS,
            reconnect_max_delay_ms: Some(RECONNECT_MAX_DELAY_MS),
            history_page_size: HISTORY_PAGE_SIZE,
            ping_interval_secs: PING_INTERVAL_SECS,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = var("HEARTH_API_URL") {
            config.api_url = url;
        }

        if let Some(url) = var("HEARTH_WS_URL") {
            if !url.is_empty() {
                config.ws_url_override = Some(url);
            }
        }

        if let Some(dir) = var("HEARTH_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(val) = var("HEARTH_PERSIST_DEBOUNCE_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.persist_debounce_ms = ms,
                Err(_) => tracing::warn!(
                    value = %val,
                    "Invalid HEARTH_PERSIST_DEBOUNCE_MS, using default"
                ),
            }
        }

        if let Some(val) = var("HEARTH_RECONNECT_MAX_MS") {
            match val.parse::<u64>() {
                Ok(0) => config.reconnect_max_delay_ms = None,
                Ok(ms) => config.reconnect_max_delay_ms = Some(ms),
                Err(_) => tracing::warn!(
                    value = %val,
                    "Invalid HEARTH_RECONNECT_MAX_MS, using default"
                ),
            }
        }

        if let Some(val) = var("HEARTH_HISTORY_PAGE_SIZE") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.history_page_size = n,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid HEARTH_HISTORY_PAGE_SIZE, using default"
                ),
            }
        }

        config
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.reconnect_base_delay_ms),
            self.reconnect_max_delay_ms.map(Duration::from_millis),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(pairs: &[(&str, &str)]) -> ClientConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.reconnect_base_delay_ms, 250);
        assert_eq!(config.reconnect_max_delay_ms, Some(60_000));
        assert_eq!(config.history_page_size, 50);
        assert_eq!(from(&[]), config);
    }

    #[test]
    fn test_env_overrides() {
        let config = from(&[
            ("HEARTH_API_URL", "http://localhost:8000"),
            ("HEARTH_WS_URL", "ws://localhost:9000"),
            ("HEARTH_PERSIST_DEBOUNCE_MS", "100"),
            ("HEARTH_HISTORY_PAGE_SIZE", "20"),
        ]);
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.ws_url_override.as_deref(), Some("ws://localhost:9000"));
        assert_eq!(config.persist_debounce(), Duration::from_millis(100));
        assert_eq!(config.history_page_size, 20);
    }

    #[test]
    fn test_zero_disables_backoff_ceiling() {
        assert_eq!(from(&[("HEARTH_RECONNECT_MAX_MS", "0")]).reconnect_max_delay_ms, None);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = from(&[
            ("HEARTH_PERSIST_DEBOUNCE_MS", "soon"),
            ("HEARTH_HISTORY_PAGE_SIZE", "0"),
            ("HEARTH_RECONNECT_MAX_MS", "-1"),
        ]);
        assert_eq!(config, ClientConfig::default());
    }
}
