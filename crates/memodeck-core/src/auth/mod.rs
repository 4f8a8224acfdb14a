//! Authentication module for token inspection and session lifecycle.
//!
//! This module provides:
//! - `jwt`: trust-but-inspect decoding of access-token claims
//! - `session`: expiry evaluation and the startup session bootstrap
//!
//! Tokens are issued by the backend; nothing here verifies signatures.

pub mod jwt;
pub mod session;

pub use jwt::{decode_jwt_payload, JwtPayload};
pub use session::{
    bootstrap_session, is_token_expired, token_expiry, token_remaining_ms, SessionStatus,
};
