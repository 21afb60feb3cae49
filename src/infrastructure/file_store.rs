// File-backed key-value store - One JSON file per key
use crate::application::key_value_store::KeyValueStore;
use anyhow::Context;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.directory.join(format!("{file_name}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .with_context(|| format!("Failed to create {}", self.directory.display()))?;

        let path = self.path_for(key);
        tokio::fs::write(&path, value)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!("Stored {} at {}", key, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("layouts"));

        assert_eq!(store.get("dashboard-layout-a").await.unwrap(), None);

        store
            .set("dashboard-layout-a", "{\"grid\":[]}".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get("dashboard-layout-a").await.unwrap().as_deref(),
            Some("{\"grid\":[]}")
        );
        assert!(dir.path().join("layouts/dashboard-layout-a.json").exists());
    }

    #[test]
    fn test_keys_are_sanitized() {
        let store = FileStore::new("/tmp/store");
        assert_eq!(
            store.path_for("dashboard-layout-../etc"),
            PathBuf::from("/tmp/store/dashboard-layout-___etc.json")
        );
    }
}
