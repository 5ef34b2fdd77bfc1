//! In-memory key-value backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use lunara_core::traits::{KeyValueStore, StoreName};
use lunara_core::{Error, Result};

/// Volatile [`KeyValueStore`]. Keys iterate in sorted order.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    stores: RwLock<HashMap<StoreName, BTreeMap<String, Vec<u8>>>>,
    unavailable: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `Error::Storage`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of keys in a store.
    pub async fn len(&self, store: StoreName) -> usize {
        self.stores
            .read()
            .await
            .get(&store)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Storage("memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn put(&self, store: StoreName, key: &str, value: Vec<u8>) -> Result<()> {
        self.check()?;
        self.stores
            .write()
            .await
            .entry(store)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, store: StoreName, key: &str) -> Result<Option<Vec<u8>>> {
        self.check()?;
        Ok(self
            .stores
            .read()
            .await
            .get(&store)
            .and_then(|m| m.get(key).cloned()))
    }

    async fn get_all(&self, store: StoreName) -> Result<Vec<(String, Vec<u8>)>> {
        self.check()?;
        Ok(self
            .stores
            .read()
            .await
            .get(&store)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn delete(&self, store: StoreName, key: &str) -> Result<()> {
        self.check()?;
        if let Some(m) = self.stores.write().await.get_mut(&store) {
            m.remove(key);
        }
        Ok(())
    }

    async fn clear(&self, store: StoreName) -> Result<()> {
        self.check()?;
        self.stores.write().await.remove(&store);
        Ok(())
    }
}
