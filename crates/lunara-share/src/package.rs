//! Share package wire format.
//!
//! ```text
//! {
//!   "entries": [
//!     { "encryptedData": <envelope>, "timestamp": 1704067200000,
//!       "localTimestamp": 1704067200000, "entryId": 1 }
//!   ],
//!   "metadata": { "sharedBy": "did:privy:...", "sharedAt": 1704153600000,
//!                 "shareType": "partner", "totalEntries": 1 }
//! }
//! ```
//!
//! Timestamps are Unix milliseconds. Packages are immutable once published.

use serde::{Deserialize, Serialize};
use tracing::warn;

use lunara_core::defaults::PACKAGE_NAME_PREFIX;
use lunara_core::{Result, ShareType};
use lunara_crypto::EncryptedEnvelope;

/// One record re-encrypted for the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareEntry {
    pub encrypted_data: EncryptedEnvelope,
    pub timestamp: i64,
    pub local_timestamp: i64,
    /// Position-based id scoped to the package, starting at 1. Not a record id.
    pub entry_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePackageMetadata {
    pub shared_by: String,
    pub shared_at: i64,
    pub share_type: ShareType,
    pub total_entries: usize,
}

/// The unit published to content-addressed storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePackage {
    pub entries: Vec<ShareEntry>,
    pub metadata: SharePackageMetadata,
}

impl SharePackage {
    /// Assemble a package; `totalEntries` is taken from `entries`.
    pub fn new(
        shared_by: impl Into<String>,
        share_type: ShareType,
        shared_at: i64,
        entries: Vec<ShareEntry>,
    ) -> Self {
        Self {
            metadata: SharePackageMetadata {
                shared_by: shared_by.into(),
                shared_at,
                share_type,
                total_entries: entries.len(),
            },
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Upload name: `cycle-share-{shareType}-{sharedAt}-{uuid}.json`.
    pub fn upload_name(&self) -> String {
        format!(
            "{}-{}-{}-{}.json",
            PACKAGE_NAME_PREFIX,
            self.metadata.share_type,
            self.metadata.shared_at,
            uuid::Uuid::new_v4().simple()
        )
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a fetched package.
    ///
    /// A declared count that disagrees with the entries carried is logged and
    /// left as written; the entries are what recipients open.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let package: Self = serde_json::from_slice(bytes)?;
        if package.metadata.total_entries != package.entries.len() {
            warn!(
                declared = package.metadata.total_entries,
                carried = package.entries.len(),
                shared_by = %package.metadata.shared_by,
                "Share package entry count mismatch"
            );
        }
        Ok(package)
    }
}
