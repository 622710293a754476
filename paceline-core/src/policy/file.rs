use std::path::{Path, PathBuf};

use async_trait::async_trait;
use paceline_contracts::store::{SettingsStore, StoreEntries, StoreError};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

/// Settings store persisted as a single JSON object on disk.
///
/// Mirrors the extension storage layout so exported settings can be read and
/// edited outside the browser. Writes go to a sibling temp file first and are
/// renamed into place.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoreEntries, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreEntries::new());
            }
            Err(err) => return Err(err.into()),
        };
        if contents.trim().is_empty() {
            return Ok(StoreEntries::new());
        }
        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Malformed {
                key: self.path.display().to_string(),
                reason: format!("expected a JSON object, found {other}"),
            }),
        }
    }

    async fn persist(&self, entries: &StoreEntries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let body = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Persisted settings");
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<StoreEntries, StoreError> {
        let mut all = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|key| all.remove(*key).map(|value| (key.to_string(), value)))
            .collect())
    }

    async fn set(&self, entries: StoreEntries) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.load().await?;
        for (key, value) in entries {
            all.insert(key, value);
        }
        self.persist(&all).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("settings.json"));
        assert!(store.get(&["channels"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_merges_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = JsonFileStore::new(&path);

        let mut first = StoreEntries::new();
        first.insert("defaultSpeed".into(), json!("1.5"));
        store.set(first).await.unwrap();

        let mut second = StoreEntries::new();
        second.insert("channels".into(), json!({"Acme": "2"}));
        store.set(second).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        let entries = reopened.get(&["channels", "defaultSpeed", "other"]).await.unwrap();
        assert_eq!(entries.get("defaultSpeed"), Some(&json!("1.5")));
        assert_eq!(entries.get("channels"), Some(&json!({"Acme": "2"})));
        assert!(!entries.contains_key("other"));
    }

    #[tokio::test]
    async fn non_object_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.get(&["channels"]).await,
            Err(StoreError::Malformed { .. })
        ));
    }
}
