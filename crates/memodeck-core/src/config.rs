//! Client configuration management.
//!
//! This module holds the global knobs shared by the API client and the
//! credential store: base URL, timeout/retry defaults, client version
//! reported to the backend, and the storage key names.
//!
//! Defaults are compiled in; `ClientConfig::from_env` applies overrides
//! from the environment (and a `.env` file if present).

use std::time::Duration;

use tracing::warn;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Delay before the first retry in milliseconds.
/// Retries back off linearly from here (delay * attempt number).
const RETRY_DELAY_MS: u64 = 1000;

/// Maximum number of attempts for a failed request.
const MAX_RETRIES: u32 = 3;

/// Default base URL for the memodeck backend.
const API_BASE_URL: &str = "https://api.memodeck.app";

/// Names of the values the credential store persists.
///
/// The token and user profile live in the secret tier, theme and language
/// in the plain tier. `migration_done` is a plain-tier marker set once the
/// legacy plain-tier token has been moved into the secret tier.
#[derive(Debug, Clone)]
pub struct StorageKeys {
    pub auth_token: String,
    pub user_profile: String,
    pub theme: String,
    pub language: String,
    pub migration_done: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            auth_token: "auth_token".to_string(),
            user_profile: "user_profile".to_string(),
            theme: "theme".to_string(),
            language: "language".to_string(),
            migration_done: "secure_migration_done".to_string(),
        }
    }
}

/// Global configuration for the API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL prefixed to relative request paths.
    pub base_url: String,
    /// Per-attempt timeout. A timed-out attempt is not retried.
    pub timeout: Duration,
    /// Base delay between retries; attempt N waits `retry_delay * N`.
    pub retry_delay: Duration,
    /// Maximum attempts per request.
    pub max_retries: u32,
    /// Client version reported in request headers.
    pub app_version: String,
    /// Platform tag reported in request headers.
    pub platform: String,
    /// Storage key names used by the credential store.
    pub storage_keys: StorageKeys,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            max_retries: MAX_RETRIES,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            storage_keys: StorageKeys::default(),
        }
    }
}

impl ClientConfig {
    /// Build a configuration from the environment.
    ///
    /// Loads a `.env` file if present, then applies `API_BASE_URL`,
    /// `API_TIMEOUT_MS`, `RETRY_DELAY_MS` and `MAX_RETRIES` on top of the
    /// compiled-in defaults. Malformed numeric values fall back to the
    /// default with a warning.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(url) = std::env::var("API_BASE_URL") {
            if !url.is_empty() {
                config.base_url = url;
            }
        }
        if let Some(ms) = Self::env_u64("API_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = Self::env_u64("RETRY_DELAY_MS") {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(n) = Self::env_u64("MAX_RETRIES") {
            config.max_retries = n as u32;
        }

        config
    }

    fn env_u64(name: &str) -> Option<u64> {
        let raw = std::env::var(name).ok()?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(var = name, value = %raw, "Ignoring malformed numeric environment variable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry_delay, Duration::from_millis(1000));
        assert_eq!(config.max_retries, 3);
        assert!(config.base_url.starts_with("https://"));
    }

    #[test]
    fn test_storage_keys_are_distinct() {
        let keys = StorageKeys::default();
        let all = [
            &keys.auth_token,
            &keys.user_profile,
            &keys.theme,
            &keys.language,
            &keys.migration_done,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
