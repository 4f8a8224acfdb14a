use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::StorageBackend;

/// In-memory storage backend.
///
/// Holds values for the lifetime of the process only. Used by tests and
/// by embedders that manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.items
            .lock()
            .expect("memory backend lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .items
            .lock()
            .expect("memory backend lock poisoned")
            .get(key)
            .cloned())
    }

    async fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        self.items
            .lock()
            .expect("memory backend lock poisoned")
            .remove(key);
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.items
            .lock()
            .expect("memory backend lock poisoned")
            .clear();
        Ok(())
    }
}
