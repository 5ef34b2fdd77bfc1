//! In-memory collaborators.
//!
//! Drop-in [`BlobStore`], [`ShareRegistry`] and [`WalletProvider`]
//! implementations for tests and offline runs. Each can be told to fail in
//! the ways the real services do.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use lunara_core::traits::{BlobStore, RegistryEntry, ShareRegistry, WalletProvider};
use lunara_core::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Consume one unit of a failure budget.
fn take_failure(budget: &AtomicU32) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

// =============================================================================
// BLOB STORE
// =============================================================================

struct StoredBlob {
    bytes: Vec<u8>,
    /// Downloads still answered with not-found.
    pending_misses: u32,
}

/// Content-addressed store keyed by the blake3 hash of the bytes.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, StoredBlob>>,
    propagation_delay: u32,
    failing_uploads: AtomicU32,
    upload_attempts: AtomicU32,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the first `misses` downloads of each new blob with not-found.
    pub fn with_propagation_delay(mut self, misses: u32) -> Self {
        self.propagation_delay = misses;
        self
    }

    /// Fail the next `n` uploads with a transient publish error.
    pub fn fail_next_uploads(&self, n: u32) {
        self.failing_uploads.store(n, Ordering::SeqCst);
    }

    pub fn upload_attempts(&self) -> u32 {
        self.upload_attempts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        lock(&self.blobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content id the store assigns to `bytes`.
    pub fn content_id_for(bytes: &[u8]) -> String {
        format!("b3{}", blake3::hash(bytes).to_hex())
    }

    /// Replace stored bytes without changing the content id.
    pub fn tamper(&self, content_id: &str, bytes: Vec<u8>) -> bool {
        match lock(&self.blobs).get_mut(content_id) {
            Some(blob) => {
                blob.bytes = bytes;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<String> {
        self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_uploads) {
            return Err(Error::Publish("pinning service unavailable".to_string()));
        }
        let content_id = Self::content_id_for(&bytes);
        debug!(content_id = %content_id, name, size = bytes.len(), "memory_blobs: upload");
        lock(&self.blobs)
            .entry(content_id.clone())
            .or_insert(StoredBlob {
                bytes,
                pending_misses: self.propagation_delay,
            });
        Ok(content_id)
    }

    async fn download(&self, content_id: &str) -> Result<Vec<u8>> {
        let mut blobs = lock(&self.blobs);
        match blobs.get_mut(content_id) {
            Some(blob) if blob.pending_misses > 0 => {
                blob.pending_misses -= 1;
                Err(Error::Fetch {
                    content_id: content_id.to_string(),
                    not_found: true,
                    message: "not yet propagated".to_string(),
                })
            }
            Some(blob) => Ok(blob.bytes.clone()),
            None => Err(Error::Fetch {
                content_id: content_id.to_string(),
                not_found: true,
                message: "unknown content id".to_string(),
            }),
        }
    }

    async fn exists(&self, content_id: &str) -> Result<bool> {
        Ok(lock(&self.blobs)
            .get(content_id)
            .is_some_and(|blob| blob.pending_misses == 0))
    }
}

// =============================================================================
// SHARE REGISTRY
// =============================================================================

/// Append-only registry with a monotonic clock.
pub struct MemoryShareRegistry {
    entries: Mutex<Vec<RegistryEntry>>,
    unfunded: Mutex<HashSet<String>>,
    clock: AtomicU64,
    failing_writes: AtomicU32,
    write_attempts: AtomicU32,
}

impl Default for MemoryShareRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryShareRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            unfunded: Mutex::new(HashSet::new()),
            clock: AtomicU64::new(1_700_000_000),
            failing_writes: AtomicU32::new(0),
            write_attempts: AtomicU32::new(0),
        }
    }

    /// Writes signed by `address` fail for lack of gas.
    pub fn mark_unfunded(&self, address: &str) {
        lock(&self.unfunded).insert(address.to_lowercase());
    }

    pub fn mark_funded(&self, address: &str) {
        lock(&self.unfunded).remove(&address.to_lowercase());
    }

    /// Fail the next `n` writes with a transient error.
    pub fn fail_next_writes(&self, n: u32) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    pub fn write_attempts(&self) -> u32 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Append a tuple as-is, bypassing validation. Useful for seeding codes
    /// this build does not know.
    pub fn insert_raw(&self, entry: RegistryEntry) {
        self.clock.fetch_max(entry.timestamp, Ordering::SeqCst);
        lock(&self.entries).push(entry);
    }

    pub fn entries(&self) -> Vec<RegistryEntry> {
        lock(&self.entries).clone()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn filter(&self, pred: impl Fn(&RegistryEntry) -> bool) -> Vec<RegistryEntry> {
        lock(&self.entries).iter().filter(|e| pred(e)).cloned().collect()
    }
}

#[async_trait]
impl ShareRegistry for MemoryShareRegistry {
    async fn record(
        &self,
        sender: &str,
        recipient: &str,
        content_id: &str,
        share_type_code: u8,
    ) -> Result<String> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if lock(&self.unfunded).contains(&sender.to_lowercase()) {
            return Err(Error::RegistryWrite(
                "insufficient funds for gas * price + value".to_string(),
            ));
        }
        if take_failure(&self.failing_writes) {
            return Err(Error::RegistryWrite("replacement transaction underpriced".to_string()));
        }

        let entry = RegistryEntry {
            content_id: content_id.to_string(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            share_type_code,
            timestamp: self.tick(),
        };
        let tx = format!(
            "0x{}",
            blake3::hash(format!("{}:{}:{}", entry.content_id, entry.sender, entry.timestamp).as_bytes())
                .to_hex()
        );
        lock(&self.entries).push(entry);
        Ok(tx)
    }

    async fn list_sent_by(&self, address: &str) -> Result<Vec<RegistryEntry>> {
        Ok(self.filter(|e| e.sender.eq_ignore_ascii_case(address)))
    }

    async fn list_received_by(&self, address: &str) -> Result<Vec<RegistryEntry>> {
        Ok(self.filter(|e| e.recipient.eq_ignore_ascii_case(address)))
    }
}

// =============================================================================
// WALLET
// =============================================================================

/// Wallet with a fixed identity and deterministic signatures.
pub struct StaticWallet {
    user_id: String,
    address: Mutex<Option<String>>,
    rejecting: AtomicBool,
    failing_signs: AtomicU32,
    sign_calls: AtomicU32,
}

impl StaticWallet {
    pub fn new(user_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            address: Mutex::new(Some(address.into())),
            rejecting: AtomicBool::new(false),
            failing_signs: AtomicU32::new(0),
            sign_calls: AtomicU32::new(0),
        }
    }

    /// Decline every signature prompt.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Time out the next `n` signature prompts.
    pub fn fail_next_signs(&self, n: u32) {
        self.failing_signs.store(n, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        *lock(&self.address) = None;
    }

    pub fn sign_calls(&self) -> u32 {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for StaticWallet {
    fn user_id(&self) -> Option<String> {
        Some(self.user_id.clone())
    }

    fn wallet_address(&self) -> Option<String> {
        lock(&self.address).clone()
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(Error::SignatureRejected("user rejected the request".to_string()));
        }
        if take_failure(&self.failing_signs) {
            return Err(Error::SignatureTransient("wallet did not respond".to_string()));
        }
        let digest = blake3::hash(format!("{}|{}", self.user_id, message).as_bytes());
        Ok(format!("0x{}", digest.to_hex()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blob_ids_are_content_addressed() {
        let store = MemoryBlobStore::new();
        let a = store.upload(b"same".to_vec(), "one.json").await.unwrap();
        let b = store.upload(b"same".to_vec(), "two.json").await.unwrap();
        let c = store.upload(b"other".to_vec(), "three.json").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_propagation_delay() {
        let store = MemoryBlobStore::new().with_propagation_delay(1);
        let cid = store.upload(b"x".to_vec(), "x.json").await.unwrap();
        assert!(!store.exists(&cid).await.unwrap());
        assert!(matches!(
            store.download(&cid).await,
            Err(Error::Fetch { not_found: true, .. })
        ));
        assert_eq!(store.download(&cid).await.unwrap(), b"x");
        assert!(store.exists(&cid).await.unwrap());
    }

    #[tokio::test]
    async fn test_registry_is_append_only_and_monotonic() {
        let registry = MemoryShareRegistry::new();
        registry.record("0xA", "0xB", "c1", 0).await.unwrap();
        registry.record("0xA", "0xC", "c2", 1).await.unwrap();
        let sent = registry.list_sent_by("0xa").await.unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].timestamp < sent[1].timestamp);
        assert_eq!(registry.list_received_by("0xb").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_registry_unfunded_sender() {
        let registry = MemoryShareRegistry::new();
        registry.mark_unfunded("0xA");
        let err = registry.record("0xa", "0xB", "c1", 0).await.unwrap_err();
        assert!(err.to_string().contains("insufficient funds"));
        assert!(registry.entries().is_empty());
    }

    #[tokio::test]
    async fn test_wallet_signatures_deterministic() {
        let wallet = StaticWallet::new("did:alice", "0xA11CE");
        let a = wallet.sign_message("m").await.unwrap();
        let b = wallet.sign_message("m").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, wallet.sign_message("n").await.unwrap());
        assert_eq!(wallet.sign_calls(), 3);
    }

    #[tokio::test]
    async fn test_wallet_failure_modes() {
        let wallet = StaticWallet::new("did:alice", "0xA11CE");
        wallet.fail_next_signs(1);
        assert!(matches!(
            wallet.sign_message("m").await,
            Err(Error::SignatureTransient(_))
        ));
        assert!(wallet.sign_message("m").await.is_ok());
        wallet.set_rejecting(true);
        assert!(matches!(
            wallet.sign_message("m").await,
            Err(Error::SignatureRejected(_))
        ));
        wallet.disconnect();
        assert_eq!(wallet.wallet_address(), None);
    }
}
