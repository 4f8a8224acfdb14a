use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How often the background sweep removes fully-expired entries.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

const MINUTE_MS: i64 = 60 * 1000;

/// Request categories with independent limits.
///
/// The built-in categories carry compiled-in defaults; `Custom` lets
/// callers register further categories at runtime via
/// [`RateLimiter::set_config`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateLimitCategory {
    /// Login and credential endpoints. Tight limit, long block.
    Auth,
    /// General API traffic.
    Api,
    /// Media and deck uploads.
    Upload,
    /// Card/deck search. Never blocks, only denies until the window rolls.
    Search,
    /// Caller-defined category; register a config for it.
    Custom(String),
}

impl fmt::Display for RateLimitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => write!(f, "auth"),
            Self::Api => write!(f, "api"),
            Self::Upload => write!(f, "upload"),
            Self::Search => write!(f, "search"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Limit parameters for one category.
///
/// A config is read once per check; replacing it affects subsequent
/// checks only.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed within one window.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: i64,
    /// Block imposed once the limit is exceeded. `None` means the
    /// category never blocks; it just denies until the window rolls over.
    pub block_duration_ms: Option<i64>,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_ms: i64) -> Self {
        Self {
            max_requests,
            window_ms,
            block_duration_ms: None,
        }
    }

    pub fn with_block(max_requests: u32, window_ms: i64, block_duration_ms: i64) -> Self {
        Self {
            max_requests,
            window_ms,
            block_duration_ms: Some(block_duration_ms),
        }
    }
}

/// Outcome of a limit check or status query.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window, when known.
    pub remaining_requests: Option<u32>,
    /// When the current window ends, epoch milliseconds.
    pub reset_time: Option<i64>,
    /// When an active block lifts, epoch milliseconds.
    pub blocked_until: Option<i64>,
}

impl RateLimitDecision {
    fn allowed(remaining: u32, reset_time: i64) -> Self {
        Self {
            allowed: true,
            remaining_requests: Some(remaining),
            reset_time: Some(reset_time),
            blocked_until: None,
        }
    }

    fn denied(reset_time: i64, blocked_until: Option<i64>) -> Self {
        Self {
            allowed: false,
            remaining_requests: Some(0),
            reset_time: Some(reset_time),
            blocked_until,
        }
    }

    fn full_allowance(max_requests: u32) -> Self {
        Self {
            allowed: true,
            remaining_requests: Some(max_requests),
            reset_time: None,
            blocked_until: None,
        }
    }
}

/// A denial converted into an error, for callers that prefer `?` over
/// branching on [`RateLimitDecision`].
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Too many requests. Try again in {wait}.")]
    LimitExceeded { wait: String },
}

#[derive(Debug)]
struct LimitEntry {
    count: u32,
    reset_time: i64,
    blocked_until: Option<i64>,
}

impl LimitEntry {
    fn fresh(now: i64, config: &RateLimitConfig) -> Self {
        Self {
            count: 1,
            reset_time: now + config.window_ms,
            blocked_until: None,
        }
    }
}

/// Per-(category, key) sliding-window rate limiter.
///
/// Every [`check_limit`](Self::check_limit) call both checks and records:
/// there is no separate peek, each check consumes one slot. Entries are
/// created lazily, replaced wholesale when their window (or block) has
/// lapsed, and garbage-collected by [`cleanup`](Self::cleanup).
pub struct RateLimiter {
    entries: Mutex<HashMap<(RateLimitCategory, String), LimitEntry>>,
    configs: RwLock<HashMap<RateLimitCategory, RateLimitConfig>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        let mut configs = HashMap::new();
        configs.insert(
            RateLimitCategory::Auth,
            RateLimitConfig::with_block(5, 15 * MINUTE_MS, 30 * MINUTE_MS),
        );
        configs.insert(
            RateLimitCategory::Api,
            RateLimitConfig::with_block(100, MINUTE_MS, 5 * MINUTE_MS),
        );
        configs.insert(
            RateLimitCategory::Upload,
            RateLimitConfig::with_block(10, MINUTE_MS, 10 * MINUTE_MS),
        );
        configs.insert(RateLimitCategory::Search, RateLimitConfig::new(30, MINUTE_MS));

        Self {
            entries: Mutex::new(HashMap::new()),
            configs: RwLock::new(configs),
        }
    }

    /// Register or replace the config for a category. Checks already in
    /// flight keep the config they read.
    pub fn set_config(&self, category: RateLimitCategory, config: RateLimitConfig) {
        self.configs
            .write()
            .expect("rate limit config lock poisoned")
            .insert(category, config);
    }

    fn config_for(&self, category: &RateLimitCategory) -> RateLimitConfig {
        let configs = self.configs.read().expect("rate limit config lock poisoned");
        if let Some(config) = configs.get(category) {
            return config.clone();
        }
        // Unregistered custom category: inherit the general API limits.
        debug!(category = %category, "No rate limit config registered, using api defaults");
        configs
            .get(&RateLimitCategory::Api)
            .expect("built-in api config always present")
            .clone()
    }

    /// Check whether a request for `key` may proceed, consuming one slot.
    pub fn check_limit(&self, key: &str, category: RateLimitCategory) -> RateLimitDecision {
        let config = self.config_for(&category);
        let now = Utc::now().timestamp_millis();
        let label = category.to_string();

        let mut entries = self.entries.lock().expect("rate limit entry lock poisoned");
        match entries.entry((category, key.to_string())) {
            MapEntry::Vacant(slot) => {
                let entry = LimitEntry::fresh(now, &config);
                let decision =
                    RateLimitDecision::allowed(config.max_requests - 1, entry.reset_time);
                slot.insert(entry);
                decision
            }
            MapEntry::Occupied(mut slot) => {
                let entry = slot.get_mut();

                if let Some(blocked_until) = entry.blocked_until {
                    if now < blocked_until {
                        return RateLimitDecision::denied(entry.reset_time, Some(blocked_until));
                    }
                    // Block lapsed: start a fresh window with this request.
                    *entry = LimitEntry::fresh(now, &config);
                    return RateLimitDecision::allowed(config.max_requests - 1, entry.reset_time);
                }

                if now >= entry.reset_time {
                    // Window rolled over without the limit being exceeded.
                    *entry = LimitEntry::fresh(now, &config);
                    return RateLimitDecision::allowed(config.max_requests - 1, entry.reset_time);
                }

                entry.count += 1;
                if entry.count > config.max_requests {
                    if let Some(block_ms) = config.block_duration_ms {
                        entry.blocked_until = Some(now + block_ms);
                        warn!(
                            key,
                            category = %label,
                            blocked_ms = block_ms,
                            "Rate limit exceeded, blocking"
                        );
                    }
                    return RateLimitDecision::denied(entry.reset_time, entry.blocked_until);
                }

                RateLimitDecision::allowed(config.max_requests - entry.count, entry.reset_time)
            }
        }
    }

    /// Read-only snapshot for `key`. Does not consume a slot; keys with
    /// no entry (or an expired one) report their full allowance.
    pub fn get_status(&self, key: &str, category: RateLimitCategory) -> RateLimitDecision {
        let config = self.config_for(&category);
        let now = Utc::now().timestamp_millis();

        let entries = self.entries.lock().expect("rate limit entry lock poisoned");
        let Some(entry) = entries.get(&(category, key.to_string())) else {
            return RateLimitDecision::full_allowance(config.max_requests);
        };

        if let Some(blocked_until) = entry.blocked_until {
            if now < blocked_until {
                return RateLimitDecision::denied(entry.reset_time, Some(blocked_until));
            }
            return RateLimitDecision::full_allowance(config.max_requests);
        }

        if now >= entry.reset_time {
            return RateLimitDecision::full_allowance(config.max_requests);
        }

        let remaining = config.max_requests.saturating_sub(entry.count);
        RateLimitDecision {
            allowed: remaining > 0,
            remaining_requests: Some(remaining),
            reset_time: Some(entry.reset_time),
            blocked_until: None,
        }
    }

    /// Drop the entry for `key`, lifting any block immediately. Used for
    /// trusted events such as a successful password reset.
    pub fn reset_limit(&self, key: &str, category: RateLimitCategory) {
        self.entries
            .lock()
            .expect("rate limit entry lock poisoned")
            .remove(&(category, key.to_string()));
    }

    /// Drop every entry across all categories.
    pub fn clear_all(&self) {
        self.entries
            .lock()
            .expect("rate limit entry lock poisoned")
            .clear();
    }

    /// Remove entries whose window and block (if any) have both lapsed.
    /// Entries still counting or still blocked are kept.
    pub fn cleanup(&self) {
        let now = Utc::now().timestamp_millis();
        let mut entries = self.entries.lock().expect("rate limit entry lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| {
            now < entry.reset_time || entry.blocked_until.is_some_and(|b| now < b)
        });
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Removed expired rate limit entries");
        }
    }

    /// Run [`cleanup`](Self::cleanup) on a fixed interval until the
    /// returned handle is dropped or aborted.
    pub fn spawn_cleanup(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            // The first tick completes immediately; skip it so the sweep
            // runs one full interval after startup.
            interval.tick().await;
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        })
    }

    /// Check a limit, converting a denial into a [`RateLimitError`] with
    /// a human-readable wait hint.
    pub fn enforce(
        &self,
        key: &str,
        category: RateLimitCategory,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let decision = self.check_limit(key, category);
        if decision.allowed {
            return Ok(decision);
        }
        let now = Utc::now().timestamp_millis();
        let until = decision.blocked_until.or(decision.reset_time).unwrap_or(now);
        Err(RateLimitError::LimitExceeded {
            wait: format_wait(until - now),
        })
    }
}

/// Render a wait duration the way the UI surfaces it: whole minutes when
/// a minute or more remains, whole seconds otherwise, rounding up.
fn format_wait(ms: i64) -> String {
    let ms = ms.max(0);
    if ms >= MINUTE_MS {
        let minutes = (ms + MINUTE_MS - 1) / MINUTE_MS;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{} minutes", minutes)
        }
    } else {
        let seconds = ((ms + 999) / 1000).max(1);
        if seconds == 1 {
            "1 second".to_string()
        } else {
            format!("{} seconds", seconds)
        }
    }
}
