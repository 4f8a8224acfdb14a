//! Two-tier credential and preference storage.
//!
//! This module provides:
//! - `StorageBackend`: the async key/value interface both tiers sit on
//! - `EncryptedFileBackend`: encrypted-at-rest storage for secrets
//! - `PlainFileBackend`: unencrypted storage for low-sensitivity preferences
//! - `MemoryBackend`: in-memory backend for tests and embedding
//! - `CredentialStore`: the typed facade the rest of the crate uses
//!
//! Error handling is deliberately asymmetric: writes fail hard with a
//! fixed, non-leaking message, reads fail soft and report `None`. A read
//! failure is indistinguishable from "not logged in"; callers re-derive
//! session state from the server on the next authenticated call.

use async_trait::async_trait;
use thiserror::Error;

pub mod encrypted;
pub mod memory;
pub mod plain;
pub mod store;

pub use encrypted::EncryptedFileBackend;
pub use memory::MemoryBackend;
pub use plain::PlainFileBackend;
pub use store::CredentialStore;

/// Application name used for storage directory paths and the keychain
/// service entry.
pub(crate) const APP_NAME: &str = "memodeck";

/// Storage failures surfaced to callers.
///
/// Messages are fixed and never include backend error text; the raw cause
/// is logged instead. Only writes produce these; reads are swallowed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to store secure data")]
    StoreSecret,

    #[error("Failed to remove secure data")]
    RemoveSecret,

    #[error("Failed to clear secure data")]
    ClearSecrets,

    #[error("Failed to store preference data")]
    StorePlain,

    #[error("Failed to remove preference data")]
    RemovePlain,

    #[error("Failed to clear preference data")]
    ClearPlain,

    #[error("Failed to encode profile data")]
    EncodeProfile,
}

/// Async key/value storage, the shape both tiers implement.
///
/// All operations may fail; the `CredentialStore` decides which failures
/// reach the caller.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn remove_item(&self, key: &str) -> anyhow::Result<()>;
    async fn clear(&self) -> anyhow::Result<()>;
}
