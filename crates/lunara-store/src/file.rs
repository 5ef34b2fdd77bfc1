//! Filesystem key-value backend.
//!
//! Layout: `{base_path}/{store}/{hex(key)}.bin`. Keys are hex-encoded so any
//! record id is a safe file name. Writes go to a temp file first and are
//! renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use lunara_core::traits::{KeyValueStore, StoreName};
use lunara_core::{Error, Result};

const VALUE_EXTENSION: &str = "bin";
const TEMP_EXTENSION: &str = "tmp";

fn storage_err(action: &str, path: &Path, e: std::io::Error) -> Error {
    Error::Storage(format!("{} {}: {}", action, path.display(), e))
}

/// Directory-backed [`KeyValueStore`].
pub struct FileKeyValueStore {
    base_path: PathBuf,
}

impl FileKeyValueStore {
    /// Create a backend rooted at `base_path`. Directories are created lazily.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn store_dir(&self, store: StoreName) -> PathBuf {
        self.base_path.join(store.as_str())
    }

    fn value_path(&self, store: StoreName, key: &str) -> PathBuf {
        self.store_dir(store)
            .join(format!("{}.{}", hex::encode(key.as_bytes()), VALUE_EXTENSION))
    }

    /// Check that the backend can write, read and delete.
    pub async fn validate(&self) -> Result<()> {
        let probe = self.base_path.join(".health-check");
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| storage_err("create_dir_all", &self.base_path, e))?;
        fs::write(&probe, b"lunara-health-check")
            .await
            .map_err(|e| storage_err("write", &probe, e))?;
        let read_back = fs::read(&probe)
            .await
            .map_err(|e| storage_err("read", &probe, e))?;
        if read_back != b"lunara-health-check" {
            return Err(Error::Storage("health check read-back mismatch".to_string()));
        }
        fs::remove_file(&probe)
            .await
            .map_err(|e| storage_err("remove_file", &probe, e))?;
        Ok(())
    }
}

fn key_from_file_name(path: &Path) -> Option<String> {
    if path.extension()?.to_str()? != VALUE_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let bytes = hex::decode(stem).ok()?;
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn put(&self, store: StoreName, key: &str, value: Vec<u8>) -> Result<()> {
        let dir = self.store_dir(store);
        let path = self.value_path(store, key);
        debug!(store = %store, size = value.len(), "file_store: put");

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_err("create_dir_all", &dir, e))?;

        let temp_path = path.with_extension(TEMP_EXTENSION);
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "file_store: create failed");
            storage_err("create", &temp_path, e)
        })?;
        file.write_all(&value)
            .await
            .map_err(|e| storage_err("write", &temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| storage_err("sync", &temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %path.display(), error = %e, "file_store: rename failed");
            storage_err("rename", &path, e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| storage_err("set_permissions", &path, e))?;
        }

        Ok(())
    }

    async fn get(&self, store: StoreName, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.value_path(store, key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err("read", &path, e)),
        }
    }

    async fn get_all(&self, store: StoreName) -> Result<Vec<(String, Vec<u8>)>> {
        let dir = self.store_dir(store);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_err("read_dir", &dir, e)),
        };

        let mut values = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_err("read_dir", &dir, e))?
        {
            let path = entry.path();
            let Some(key) = key_from_file_name(&path) else {
                continue;
            };
            let bytes = fs::read(&path)
                .await
                .map_err(|e| storage_err("read", &path, e))?;
            values.push((key, bytes));
        }
        values.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(values)
    }

    async fn delete(&self, store: StoreName, key: &str) -> Result<()> {
        let path = self.value_path(store, key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err("remove_file", &path, e)),
        }
    }

    async fn clear(&self, store: StoreName) -> Result<()> {
        let dir = self.store_dir(store);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err("remove_dir_all", &dir, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path());
        kv.put(StoreName::Records, "rec/1", b"blob".to_vec()).await.unwrap();
        assert_eq!(
            kv.get(StoreName::Records, "rec/1").await.unwrap(),
            Some(b"blob".to_vec())
        );
        assert_eq!(kv.get(StoreName::Records, "rec/2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_and_no_temp_left() {
        let dir = tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path());
        kv.put(StoreName::Records, "a", b"1".to_vec()).await.unwrap();
        kv.put(StoreName::Records, "a", b"2".to_vec()).await.unwrap();

        let all = kv.get_all(StoreName::Records).await.unwrap();
        assert_eq!(all, vec![("a".to_string(), b"2".to_vec())]);

        let names: Vec<_> = std::fs::read_dir(dir.path().join("logEntries"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert!(names.iter().all(|n| n.ends_with(".bin")));
    }

    #[tokio::test]
    async fn test_missing_store_is_empty() {
        let dir = tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path());
        assert!(kv.get_all(StoreName::Predictions).await.unwrap().is_empty());
        kv.delete(StoreName::Predictions, "x").await.unwrap();
        kv.clear(StoreName::Predictions).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_only_one_store() {
        let dir = tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path());
        kv.put(StoreName::Records, "a", b"1".to_vec()).await.unwrap();
        kv.put(StoreName::CycleData, "a", b"2".to_vec()).await.unwrap();
        kv.clear(StoreName::Records).await.unwrap();
        assert!(kv.get_all(StoreName::Records).await.unwrap().is_empty());
        assert_eq!(kv.get_all(StoreName::CycleData).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_validate() {
        let dir = tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path().join("nested"));
        kv.validate().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_base_is_storage_error() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("not-a-dir");
        std::fs::write(&file_path, b"x").unwrap();
        let kv = FileKeyValueStore::new(&file_path);
        let err = kv
            .put(StoreName::Records, "a", b"1".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
