use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::config::StorageKeys;

use super::{EncryptedFileBackend, PlainFileBackend, StorageBackend, StorageError};

/// Typed facade over the two storage tiers.
///
/// The secret tier holds credentials (auth token, user profile) on an
/// encrypted backend; the plain tier holds preferences (theme, language)
/// on an unencrypted one. The tiers are independent namespaces: clearing
/// one never touches the other, which is why `logout` leaves preferences
/// intact.
///
/// Reads fail soft (error -> `None`, raw cause logged); writes fail hard
/// with a fixed [`StorageError`] that never leaks backend details.
pub struct CredentialStore {
    secrets: Arc<dyn StorageBackend>,
    prefs: Arc<dyn StorageBackend>,
    keys: StorageKeys,
}

impl CredentialStore {
    /// Build a store over explicit backends.
    pub fn new(
        secrets: Arc<dyn StorageBackend>,
        prefs: Arc<dyn StorageBackend>,
        keys: StorageKeys,
    ) -> Self {
        Self {
            secrets,
            prefs,
            keys,
        }
    }

    /// Build a store over the default on-disk backends: the encrypted
    /// secret file (keychain-held master secret) and the plain
    /// preferences file.
    pub fn with_default_backends(keys: StorageKeys) -> Result<Self> {
        Ok(Self::new(
            Arc::new(EncryptedFileBackend::new()?),
            Arc::new(PlainFileBackend::new()?),
            keys,
        ))
    }

    /// Key names this store was configured with.
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    // ===== Secret tier =====

    pub async fn set_secret(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.secrets.set_item(key, value).await.map_err(|e| {
            warn!(error = %e, "Secure storage write failed");
            StorageError::StoreSecret
        })
    }

    pub async fn get_secret(&self, key: &str) -> Option<String> {
        match self.secrets.get_item(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Secure storage read failed, treating as absent");
                None
            }
        }
    }

    pub async fn remove_secret(&self, key: &str) -> Result<(), StorageError> {
        self.secrets.remove_item(key).await.map_err(|e| {
            warn!(error = %e, "Secure storage remove failed");
            StorageError::RemoveSecret
        })
    }

    pub async fn clear_secrets(&self) -> Result<(), StorageError> {
        self.secrets.clear().await.map_err(|e| {
            warn!(error = %e, "Secure storage clear failed");
            StorageError::ClearSecrets
        })
    }

    // ===== Plain tier =====

    pub async fn set_plain(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.prefs.set_item(key, value).await.map_err(|e| {
            warn!(error = %e, "Preference write failed");
            StorageError::StorePlain
        })
    }

    pub async fn get_plain(&self, key: &str) -> Option<String> {
        match self.prefs.get_item(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Preference read failed, treating as absent");
                None
            }
        }
    }

    pub async fn remove_plain(&self, key: &str) -> Result<(), StorageError> {
        self.prefs.remove_item(key).await.map_err(|e| {
            warn!(error = %e, "Preference remove failed");
            StorageError::RemovePlain
        })
    }

    pub async fn clear_plain(&self) -> Result<(), StorageError> {
        self.prefs.clear().await.map_err(|e| {
            warn!(error = %e, "Preference clear failed");
            StorageError::ClearPlain
        })
    }

    // ===== Typed convenience wrappers =====

    pub async fn set_auth_token(&self, token: &str) -> Result<(), StorageError> {
        self.set_secret(&self.keys.auth_token, token).await
    }

    pub async fn get_auth_token(&self) -> Option<String> {
        self.get_secret(&self.keys.auth_token).await
    }

    /// Persist the user profile as JSON in the secret tier.
    pub async fn set_user_profile<T: Serialize>(&self, profile: &T) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(profile).map_err(|e| {
            warn!(error = %e, "Profile serialization failed");
            StorageError::EncodeProfile
        })?;
        self.set_secret(&self.keys.user_profile, &encoded).await
    }

    /// Load the stored user profile. A profile that fails to parse is
    /// reported as absent, same as a read failure.
    pub async fn get_user_profile<T: DeserializeOwned>(&self) -> Option<T> {
        let raw = self.get_secret(&self.keys.user_profile).await?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "Stored profile failed to parse, treating as absent");
                None
            }
        }
    }

    /// End the session: wipe the secret tier. Plain preferences survive
    /// so theme and language carry across logins.
    pub async fn logout(&self) -> Result<(), StorageError> {
        self.clear_secrets().await
    }

    /// Whether a token is currently stored.
    pub async fn is_authenticated(&self) -> bool {
        self.get_auth_token().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use async_trait::async_trait;
    use serde::Deserialize;

    /// Backend whose every operation fails; exercises the soft/hard split.
    struct BrokenBackend;

    #[async_trait]
    impl StorageBackend for BrokenBackend {
        async fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow::anyhow!("disk on fire"))
        }
        async fn get_item(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow::anyhow!("disk on fire"))
        }
        async fn remove_item(&self, _key: &str) -> Result<()> {
            Err(anyhow::anyhow!("disk on fire"))
        }
        async fn clear(&self) -> Result<()> {
            Err(anyhow::anyhow!("disk on fire"))
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        id: String,
        display_name: String,
    }

    fn memory_store() -> CredentialStore {
        CredentialStore::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(MemoryBackend::new()),
            StorageKeys::default(),
        )
    }

    #[tokio::test]
    async fn test_token_round_trip() {
        let store = memory_store();
        assert!(!store.is_authenticated().await);

        store.set_auth_token("tok-1").await.unwrap();
        assert!(store.is_authenticated().await);
        assert_eq!(store.get_auth_token().await.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_logout_idempotent_and_spares_preferences() {
        let store = memory_store();

        // Logout with nothing ever stored must not error.
        store.logout().await.unwrap();
        assert!(!store.is_authenticated().await);

        store.set_auth_token("tok").await.unwrap();
        store.set_plain("theme", "dark").await.unwrap();
        store.logout().await.unwrap();

        assert!(!store.is_authenticated().await);
        assert_eq!(store.get_plain("theme").await.as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn test_tiers_are_independent() {
        let store = memory_store();
        store.set_secret("k", "secret").await.unwrap();
        store.set_plain("k", "plain").await.unwrap();

        store.clear_plain().await.unwrap();
        assert_eq!(store.get_secret("k").await.as_deref(), Some("secret"));
        assert_eq!(store.get_plain("k").await, None);
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let store = memory_store();
        let profile = Profile {
            id: "u1".to_string(),
            display_name: "Dana".to_string(),
        };
        store.set_user_profile(&profile).await.unwrap();
        assert_eq!(store.get_user_profile::<Profile>().await, Some(profile));
    }

    #[tokio::test]
    async fn test_profile_parse_failure_is_absent() {
        let store = memory_store();
        let key = store.keys().user_profile.clone();
        store.set_secret(&key, "{not json").await.unwrap();
        assert_eq!(store.get_user_profile::<Profile>().await, None);
    }

    #[tokio::test]
    async fn test_reads_fail_soft_writes_fail_hard() {
        let store = CredentialStore::new(
            Arc::new(BrokenBackend),
            Arc::new(BrokenBackend),
            StorageKeys::default(),
        );

        // Reads swallow the failure.
        assert_eq!(store.get_secret("k").await, None);
        assert_eq!(store.get_plain("k").await, None);
        assert!(!store.is_authenticated().await);

        // Writes surface a fixed, non-leaking message.
        let err = store.set_secret("k", "v").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to store secure data");
        assert!(!err.to_string().contains("disk on fire"));

        let err = store.clear_secrets().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to clear secure data");

        let err = store.remove_plain("k").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to remove preference data");
    }
}
