//! Client configuration.
//!
//! Defaults match a backend running locally; every field can be overridden
//! from the environment or, in the binary, from command-line flags.

use std::time::Duration;

use serde::Deserialize;

/// Environment variable overriding [`ClientConfig::base_url`].
pub const ENV_BASE_URL: &str = "RAGDESK_API_BASE_URL";
/// Environment variable overriding [`ClientConfig::top_k`].
pub const ENV_TOP_K: &str = "RAGDESK_TOP_K";
/// Environment variable overriding [`ClientConfig::request_timeout_seconds`].
pub const ENV_REQUEST_TIMEOUT: &str = "RAGDESK_REQUEST_TIMEOUT_SECONDS";

/// Configuration for [`RagClient`](crate::RagClient).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL (e.g. `http://127.0.0.1:8000`).
    #[serde(default = "ClientConfig::default_base_url")]
    pub base_url: String,

    /// Timeout for request/response calls in seconds. Not applied to chat streams.
    #[serde(default = "ClientConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connect timeout in seconds, applied to every connection.
    #[serde(default = "ClientConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Default number of chunks for search and chat.
    #[serde(default = "ClientConfig::default_top_k")]
    pub top_k: u32,
}

impl ClientConfig {
    fn default_base_url() -> String {
        "http://127.0.0.1:8000".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    const fn default_top_k() -> u32 {
        5
    }

    /// Build a configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TOP_K) {
            match raw.trim().parse() {
                Ok(top_k) => config.top_k = top_k,
                Err(_) => tracing::warn!(key = ENV_TOP_K, value = %raw, "Ignoring invalid value"),
            }
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            match raw.trim().parse() {
                Ok(secs) => config.request_timeout_seconds = secs,
                Err(_) => {
                    tracing::warn!(key = ENV_REQUEST_TIMEOUT, value = %raw, "Ignoring invalid value");
                }
            }
        }

        config
    }

    /// Replace the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Base URL without trailing slashes.
    #[must_use]
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            top_k: Self::default_top_k(),
        }
    }
}
