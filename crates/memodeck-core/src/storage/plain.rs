use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{StorageBackend, APP_NAME};

/// File holding the preference map, under the platform config directory.
const PREFERENCES_FILE: &str = "preferences.json";

/// Unencrypted storage backend for the preference tier.
///
/// Low-sensitivity values (theme, language) live here as a pretty-printed
/// JSON map so they stay hand-inspectable. Never store credentials in
/// this tier.
pub struct PlainFileBackend {
    path: PathBuf,
    cache: Mutex<Option<HashMap<String, String>>>,
}

impl PlainFileBackend {
    /// Open the default preference store.
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not find config directory"))?
            .join(APP_NAME);
        Ok(Self::at_path(dir.join(PREFERENCES_FILE)))
    }

    /// Open a preference store at an explicit path.
    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            cache: Mutex::new(None),
        }
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read preferences file")?;
        serde_json::from_str(&contents).context("Failed to parse preferences file")
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents =
            serde_json::to_string_pretty(map).context("Failed to encode preferences")?;
        std::fs::write(&self.path, contents).context("Failed to write preferences file")
    }

    async fn cached(&self) -> Result<tokio::sync::MutexGuard<'_, Option<HashMap<String, String>>>> {
        let mut guard = self.cache.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_map()?);
        }
        Ok(guard)
    }
}

#[async_trait]
impl StorageBackend for PlainFileBackend {
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
            std::fs::remove_file(&self.path).context("Failed to remove preferences file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");

        let backend = PlainFileBackend::at_path(path.clone());
        backend.set_item("theme", "dark").await.unwrap();

        let reopened = PlainFileBackend::at_path(path);
        assert_eq!(
            reopened.get_item("theme").await.unwrap().as_deref(),
            Some("dark")
        );
    }

    #[tokio::test]
    async fn test_file_is_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        let backend = PlainFileBackend::at_path(path.clone());
        backend.set_item("language", "en").await.unwrap();

        let contents = std::fs::read_to_string(path).unwrap();
        let map: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(map.get("language").map(String::as_str), Some("en"));
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let backend = PlainFileBackend::at_path(dir.path().join("preferences.json"));
        backend.set_item("theme", "dark").await.unwrap();
        backend.clear().await.unwrap();
        assert_eq!(backend.get_item("theme").await.unwrap(), None);
    }
}
