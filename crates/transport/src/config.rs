use std::env;
use std::time::Duration;

use protocol::Encoding;

/// Client settings. `from_env` overrides the defaults with `MAPSYNC_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Settle delay between two map polls.
    pub poll_interval: Duration,
    /// Delay between collection refreshes while background work runs.
    pub collection_refresh_interval: Duration,
    /// Encoding requested from the poll endpoint.
    pub accept: Encoding,
    pub debug_autocut: bool,
    pub ignore_cache: bool,
    pub store_search_history: bool,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            poll_interval: Duration::from_millis(100),
            collection_refresh_interval: Duration::from_millis(750),
            accept: Encoding::Cbor,
            debug_autocut: false,
            ignore_cache: false,
            store_search_history: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unparsable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            base_url: lookup("MAPSYNC_BASE_URL").unwrap_or(defaults.base_url),
            poll_interval: env_var_millis(&lookup, "MAPSYNC_POLL_INTERVAL_MS", defaults.poll_interval),
            collection_refresh_interval: env_var_millis(
                &lookup,
                "MAPSYNC_COLLECTION_REFRESH_MS",
                defaults.collection_refresh_interval,
            ),
            accept: lookup("MAPSYNC_ACCEPT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.accept),
            debug_autocut: env_var_bool(&lookup, "MAPSYNC_DEBUG_AUTOCUT", defaults.debug_autocut),
            ignore_cache: env_var_bool(&lookup, "MAPSYNC_IGNORE_CACHE", defaults.ignore_cache),
            store_search_history: env_var_bool(&lookup, "MAPSYNC_STORE_HISTORY", defaults.store_search_history),
            request_timeout: env_var_millis(&lookup, "MAPSYNC_REQUEST_TIMEOUT_MS", defaults.request_timeout),
        }
    }
}

fn env_var_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn env_var_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
