use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use keyring::Entry;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::Mutex;
use tracing::debug;

use super::{StorageBackend, APP_NAME};

/// Keychain entry holding the master secret.
const MASTER_SECRET_USER: &str = "storage-master-secret";

/// File holding the sealed secret map, under the platform data directory.
const SECRETS_FILE: &str = "secrets.enc";

const MASTER_SECRET_LEN: usize = 32;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

/// Encrypted-at-rest storage backend for the secret tier.
///
/// Secrets are kept as a JSON map sealed with XChaCha20-Poly1305. The
/// cipher key is derived with Argon2id from a random master secret held
/// in the OS keychain, so the file on disk is useless without the
/// keychain entry. File layout: `salt || nonce || ciphertext`, with a
/// fresh salt and nonce on every write.
pub struct EncryptedFileBackend {
    path: PathBuf,
    master_secret: Vec<u8>,
    cache: Mutex<Option<HashMap<String, String>>>,
}

impl EncryptedFileBackend {
    /// Open the default secret store, creating the master secret in the
    /// OS keychain on first use.
    pub fn new() -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not find data directory"))?
            .join(APP_NAME);
        Ok(Self::with_master_secret(
            dir.join(SECRETS_FILE),
            Self::load_or_create_master_secret()?,
        ))
    }

    /// Open a secret store at an explicit path with a caller-provided
    /// master secret. Bypasses the OS keychain; used by tests and by
    /// embedders that manage key material themselves.
    pub fn with_master_secret(path: PathBuf, master_secret: Vec<u8>) -> Self {
        Self {
            path,
            master_secret,
            cache: Mutex::new(None),
        }
    }

    fn load_or_create_master_secret() -> Result<Vec<u8>> {
        let entry = Entry::new(APP_NAME, MASTER_SECRET_USER)
            .context("Failed to create keyring entry")?;

        match entry.get_password() {
            Ok(encoded) => STANDARD
                .decode(encoded)
                .context("Stored master secret is not valid base64"),
            Err(keyring::Error::NoEntry) => {
                let mut secret = [0u8; MASTER_SECRET_LEN];
                OsRng.fill_bytes(&mut secret);
                entry
                    .set_password(&STANDARD.encode(secret))
                    .context("Failed to store master secret in keychain")?;
                debug!("Created new storage master secret");
                Ok(secret.to_vec())
            }
            Err(e) => Err(e).context("Failed to read master secret from keychain"),
        }
    }

    fn derive_key(&self, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
        let mut key = [0u8; KEY_LEN];
        argon2::Argon2::default()
            .hash_password_into(&self.master_secret, salt, &mut key)
            .map_err(|e| anyhow!("Key derivation failed: {e}"))?;
        Ok(key)
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let raw = std::fs::read(&self.path).context("Failed to read secret store file")?;
        if raw.len() < SALT_LEN + NONCE_LEN {
            return Err(anyhow!("Secret store file is truncated"));
        }

        let (salt, rest) = raw.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        let key = self.derive_key(salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow!("Failed to decrypt secret store"))?;

        serde_json::from_slice(&plaintext).context("Secret store contents are not valid JSON")
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let key = self.derive_key(&salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = serde_json::to_vec(map).context("Failed to encode secret store")?;
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| anyhow!("Failed to encrypt secret store"))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }

        let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        std::fs::write(&self.path, out).context("Failed to write secret store file")
    }

    /// Load the map into the cache if this is the first access.
    async fn cached(&self) -> Result<tokio::sync::MutexGuard<'_, Option<HashMap<String, String>>>> {
        let mut guard = self.cache.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_map()?);
        }
        Ok(guard)
    }
}

#[async_trait]
impl StorageBackend for EncryptedFileBackend {
    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.cached().await?;
        let map = guard.as_mut().expect("cache populated above");
        map.insert(key.to_string(), value.to_string());
        self.write_map(map)
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let guard = self.cached().await?;
        Ok(guard.as_ref().expect("cache populated above").get(key).cloned())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let mut guard = self.cached().await?;
        let map = guard.as_mut().expect("cache populated above");
        if map.remove(key).is_some() {
            self.write_map(map)?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self.cache.lock().await;
        *guard = Some(HashMap::new());
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove secret store file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_backend(dir: &std::path::Path) -> EncryptedFileBackend {
        EncryptedFileBackend::with_master_secret(
            dir.join("secrets.enc"),
            b"test-master-secret-0123456789abc".to_vec(),
        )
    }

    #[tokio::test]
    async fn test_set_get_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let backend = test_backend(dir.path());
        backend.set_item("token", "abc123").await.unwrap();

        // A fresh instance with the same secret reads the same file.
        let reopened = test_backend(dir.path());
        assert_eq!(
            reopened.get_item("token").await.unwrap().as_deref(),
            Some("abc123")
        );
    }

    #[tokio::test]
    async fn test_ciphertext_not_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let backend = test_backend(dir.path());
        backend.set_item("token", "super-secret-value").await.unwrap();

        let raw = std::fs::read(dir.path().join("secrets.enc")).unwrap();
        let haystack = String::from_utf8_lossy(&raw);
        assert!(!haystack.contains("super-secret-value"));
        assert!(!haystack.contains("token"));
    }

    #[tokio::test]
    async fn test_wrong_secret_fails_to_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let backend = test_backend(dir.path());
        backend.set_item("token", "abc").await.unwrap();

        let wrong = EncryptedFileBackend::with_master_secret(
            dir.path().join("secrets.enc"),
            b"a-completely-different-secret-00".to_vec(),
        );
        assert!(wrong.get_item("token").await.is_err());
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = test_backend(dir.path());
        backend.set_item("a", "1").await.unwrap();
        backend.clear().await.unwrap();

        assert!(!dir.path().join("secrets.enc").exists());
        assert_eq!(backend.get_item("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_item() {
        let dir = tempfile::tempdir().unwrap();
        let backend = test_backend(dir.path());
        backend.set_item("a", "1").await.unwrap();
        backend.set_item("b", "2").await.unwrap();
        backend.remove_item("a").await.unwrap();

        assert_eq!(backend.get_item("a").await.unwrap(), None);
        assert_eq!(backend.get_item("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = test_backend(dir.path());
        assert_eq!(backend.get_item("anything").await.unwrap(), None);
    }
}
