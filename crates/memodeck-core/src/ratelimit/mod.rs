//! Client-side request rate limiting.
//!
//! This module provides the `RateLimiter`, a per-key sliding-window
//! counter used as a guard in front of sensitive request paths (login,
//! uploads, search). It is independent of the API client: callers consult
//! it before issuing a request and surface denials as "try again in N"
//! messaging.

pub mod limiter;

pub use limiter::{
    RateLimitCategory, RateLimitConfig, RateLimitDecision, RateLimitError, RateLimiter,
};
