//! Token-based session validity and startup bootstrap.
//!
//! The evaluation functions are pure: they depend only on the token's
//! claims and the current wall clock, and they fail closed; a token
//! whose expiry cannot be determined is treated as expired.
//!
//! `bootstrap_session` is the startup routine that ties the credential
//! store, the evaluator, and the API client together: it migrates a
//! legacy plain-tier token into the secret tier on first run, installs a
//! still-valid persisted token into the client, and logs the user out if
//! the persisted token has expired.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::storage::CredentialStore;

use super::jwt::decode_jwt_payload;

/// Whether a token is expired.
///
/// Fails closed: a token that does not decode, or that carries no `exp`
/// claim, is expired. The boundary is exact: a token expiring this very
/// second is already expired.
pub fn is_token_expired(token: &str) -> bool {
    match decode_jwt_payload(token).and_then(|p| p.exp) {
        Some(exp) => exp <= Utc::now().timestamp(),
        None => true,
    }
}

/// Expiry timestamp of a token, if it has one.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let exp = decode_jwt_payload(token)?.exp?;
    DateTime::from_timestamp(exp, 0)
}

/// Milliseconds until a token expires. Zero if already expired or if the
/// expiry cannot be determined.
pub fn token_remaining_ms(token: &str) -> i64 {
    match token_expiry(token) {
        Some(expiry) => (expiry.timestamp_millis() - Utc::now().timestamp_millis()).max(0),
        None => 0,
    }
}

/// Outcome of the startup session check.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    /// A valid token was found and installed into the API client.
    Authenticated {
        /// Time left before the token expires.
        remaining: Duration,
    },
    /// A token was found but has expired; stored secrets were cleared.
    Expired,
    /// No token is stored.
    Unauthenticated,
}

/// Decide the session state at application start.
///
/// Runs the one-time storage migration, then loads the persisted token
/// and evaluates it. A valid token is installed into `client`; an expired
/// one triggers a logout (secret tier wiped, client token cleared).
/// Storage write failures during migration or logout propagate; a missing
/// or unreadable token is simply "not logged in".
pub async fn bootstrap_session(
    store: &Arc<CredentialStore>,
    client: &ApiClient,
) -> Result<SessionStatus> {
    migrate_legacy_token(store)
        .await
        .context("Failed to migrate legacy credentials")?;

    let Some(token) = store.get_auth_token().await else {
        debug!("No stored token, starting unauthenticated");
        return Ok(SessionStatus::Unauthenticated);
    };

    if is_token_expired(&token) {
        warn!("Stored token has expired, logging out");
        client.clear_auth_token();
        store
            .logout()
            .await
            .context("Failed to clear expired session")?;
        return Ok(SessionStatus::Expired);
    }

    client.set_auth_token(&token);
    Ok(SessionStatus::Authenticated {
        remaining: Duration::milliseconds(token_remaining_ms(&token)),
    })
}

/// Move a token stored by older releases in the plain tier into the
/// secret tier. Runs once; the plain-tier marker records completion.
async fn migrate_legacy_token(store: &Arc<CredentialStore>) -> Result<()> {
    let keys = store.keys().clone();

    if store.get_plain(&keys.migration_done).await.is_some() {
        return Ok(());
    }

    if let Some(legacy) = store.get_plain(&keys.auth_token).await {
        store.set_auth_token(&legacy).await?;
        store.remove_plain(&keys.auth_token).await?;
        info!("Migrated legacy token into secure storage");
    }

    store.set_plain(&keys.migration_done, "true").await?;
    Ok(())
}
