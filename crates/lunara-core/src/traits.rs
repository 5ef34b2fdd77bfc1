//! Collaborator interfaces.
//!
//! The wallet, the content-addressed blob store, the share registry and the
//! local key-value storage are external systems. These traits are the only
//! surface the rest of lunara sees, so concrete backends are pluggable and
//! tests can run against in-memory doubles.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::share_type::ShareType;

// =============================================================================
// WALLET
// =============================================================================

/// Auth/wallet provider.
///
/// `sign_message` must be deterministic in content for a fixed message; the
/// self key is derived from its output. Implementations report a declined
/// prompt as `Error::SignatureRejected` and connectivity problems as
/// `Error::SignatureTransient`.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Stable user identifier, `None` when nobody is logged in.
    fn user_id(&self) -> Option<String>;

    /// Public wallet address, `None` when no wallet is connected.
    fn wallet_address(&self) -> Option<String>;

    /// Sign an arbitrary message.
    async fn sign_message(&self, message: &str) -> Result<String>;
}

// =============================================================================
// CONTENT-ADDRESSED BLOB STORE
// =============================================================================

/// Content-addressed blob store (IPFS pinning service or equivalent).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a display name; returns the content identifier.
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<String>;

    /// Fetch bytes by content identifier.
    ///
    /// Unknown identifiers fail with `Error::Fetch { not_found: true, .. }`.
    async fn download(&self, content_id: &str) -> Result<Vec<u8>>;

    /// Whether the identifier currently resolves.
    async fn exists(&self, content_id: &str) -> Result<bool>;
}

// =============================================================================
// SHARE REGISTRY
// =============================================================================

/// A registry tuple as the ledger returns it, share type still encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub content_id: String,
    pub sender: String,
    pub recipient: String,
    pub share_type_code: u8,
    /// Seconds since the Unix epoch (block time).
    pub timestamp: u64,
}

/// A decoded registry tuple. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub content_id: String,
    pub sender: String,
    pub recipient: String,
    pub share_type: ShareType,
    pub timestamp: u64,
}

impl TryFrom<RegistryEntry> for ShareRecord {
    type Error = crate::error::Error;

    fn try_from(entry: RegistryEntry) -> Result<Self> {
        Ok(Self {
            share_type: ShareType::try_from(entry.share_type_code)?,
            content_id: entry.content_id,
            sender: entry.sender,
            recipient: entry.recipient,
            timestamp: entry.timestamp,
        })
    }
}

/// Append-only on-chain share registry.
///
/// Write failures caused by an unfunded signer should surface a message
/// containing "insufficient funds"; the registry client maps that to
/// `Error::InsufficientFunds`.
#[async_trait]
pub trait ShareRegistry: Send + Sync {
    /// Append a share tuple; returns a transaction receipt id.
    async fn record(
        &self,
        sender: &str,
        recipient: &str,
        content_id: &str,
        share_type_code: u8,
    ) -> Result<String>;

    /// Every tuple whose sender is `address`.
    async fn list_sent_by(&self, address: &str) -> Result<Vec<RegistryEntry>>;

    /// Every tuple whose recipient is `address`.
    async fn list_received_by(&self, address: &str) -> Result<Vec<RegistryEntry>>;
}

// =============================================================================
// LOCAL KEY-VALUE STORAGE
// =============================================================================

/// Logical stores inside local persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreName {
    Records,
    CycleData,
    Predictions,
    /// Bookkeeping such as the key-material canary.
    Meta,
}

impl StoreName {
    pub const ALL: [StoreName; 4] = [
        StoreName::Records,
        StoreName::CycleData,
        StoreName::Predictions,
        StoreName::Meta,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreName::Records => "logEntries",
            StoreName::CycleData => "cycleData",
            StoreName::Predictions => "predictions",
            StoreName::Meta => "meta",
        }
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local persistent key-value storage holding opaque blobs.
///
/// Failures to reach the backing medium are reported as `Error::Storage`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Insert or replace a value.
    async fn put(&self, store: StoreName, key: &str, value: Vec<u8>) -> Result<()>;

    /// Fetch one value.
    async fn get(&self, store: StoreName, key: &str) -> Result<Option<Vec<u8>>>;

    /// Every `(key, value)` pair in a store.
    async fn get_all(&self, store: StoreName) -> Result<Vec<(String, Vec<u8>)>>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, store: StoreName, key: &str) -> Result<()>;

    /// Remove every key in a store.
    async fn clear(&self, store: StoreName) -> Result<()>;
}
