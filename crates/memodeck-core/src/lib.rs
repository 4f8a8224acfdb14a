//! memodeck-core - resilient client plumbing for the memodeck app.
//!
//! This crate is the networking and credential layer the UI sits on:
//!
//! - [`api`]: the resilient REST client (timeouts, retries with linear
//!   backoff, uniform response envelopes, session teardown on 401)
//! - [`ratelimit`]: per-key sliding-window request throttling with
//!   block-on-exceed semantics
//! - [`auth`]: JWT claim inspection and session validity, plus the
//!   startup bootstrap that ties token storage to the client
//! - [`storage`]: the two-tier credential store (encrypted secrets,
//!   plain preferences)
//! - [`config`]: global client configuration
//! - [`notify`]: the seam for user-facing failure notifications
//!
//! The pieces compose at startup roughly like this:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use memodeck_core::api::ApiClient;
//! use memodeck_core::auth::bootstrap_session;
//! use memodeck_core::config::ClientConfig;
//! use memodeck_core::ratelimit::{RateLimitCategory, RateLimiter};
//! use memodeck_core::storage::CredentialStore;
//!
//! # async fn start() -> anyhow::Result<()> {
//! let config = ClientConfig::from_env();
//! let store = Arc::new(CredentialStore::with_default_backends(
//!     config.storage_keys.clone(),
//! )?);
//! let client = ApiClient::new(config, store.clone())?;
//! let status = bootstrap_session(&store, &client).await?;
//!
//! let limiter = Arc::new(RateLimiter::new());
//! let _sweep = limiter.spawn_cleanup();
//! limiter.enforce("login", RateLimitCategory::Auth)?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod notify;
pub mod ratelimit;
pub mod storage;

pub use api::{ApiClient, ApiError, ApiResponse, RequestConfig};
pub use auth::{bootstrap_session, SessionStatus};
pub use config::ClientConfig;
pub use notify::Notifier;
pub use ratelimit::{RateLimitCategory, RateLimitConfig, RateLimiter};
pub use storage::{CredentialStore, StorageBackend, StorageError};
