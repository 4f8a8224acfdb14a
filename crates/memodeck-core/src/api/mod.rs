//! REST API client module for the memodeck backend.
//!
//! This module provides the `ApiClient` for communicating with the
//! backend: request building with auth and tracing headers, per-attempt
//! timeouts, bounded retries with linear backoff, and uniform
//! `ApiResponse` envelopes.
//!
//! Authentication uses a JWT bearer token sent as the raw header value
//! (the backend does not use a scheme prefix).

pub mod client;
pub mod error;
pub mod types;

pub use client::{ApiClient, ProgressCallback};
pub use error::ApiError;
pub use types::{ApiResponse, RequestConfig};
