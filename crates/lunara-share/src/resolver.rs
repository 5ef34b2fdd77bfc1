//! Recipient-side resolution of shares.
//!
//! Unlike the packager, opening a package never drops an entry: each one comes
//! back either decrypted or flagged undecryptable with its raw envelope, so a
//! viewer can render a partial share with an explicit per-entry state.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use lunara_core::models::Record;
use lunara_core::traits::ShareRecord;
use lunara_core::{BatchResult, Error, Result};
use lunara_crypto::{normalize_address, DerivedKey, EncryptedEnvelope, RecipientCipher};

use crate::package::SharePackageMetadata;
use crate::publisher::Publisher;

/// Keep the newest share per sender.
///
/// Senders are grouped case-insensitively and keyed by the lower-cased
/// address. On an exact timestamp tie the first record seen wins.
pub fn resolve_latest_per_sender(records: &[ShareRecord]) -> BTreeMap<String, ShareRecord> {
    let mut latest: BTreeMap<String, ShareRecord> = BTreeMap::new();
    for record in records {
        match latest.entry(record.sender.to_lowercase()) {
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
            Entry::Occupied(mut slot) => {
                if record.timestamp > slot.get().timestamp {
                    slot.insert(record.clone());
                }
            }
        }
    }
    latest
}

/// Outcome of decrypting one package entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryState {
    Decrypted(Record),
    Undecryptable {
        envelope: EncryptedEnvelope,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenedEntry {
    pub entry_id: u32,
    pub timestamp: i64,
    pub local_timestamp: i64,
    pub state: EntryState,
}

impl OpenedEntry {
    pub fn record(&self) -> Option<&Record> {
        match &self.state {
            EntryState::Decrypted(record) => Some(record),
            EntryState::Undecryptable { .. } => None,
        }
    }

    pub fn is_decrypted(&self) -> bool {
        self.record().is_some()
    }
}

/// A package as seen by one viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedShare {
    pub content_id: String,
    pub metadata: SharePackageMetadata,
    pub entries: Vec<OpenedEntry>,
}

impl OpenedShare {
    pub fn records(&self) -> Vec<&Record> {
        self.entries.iter().filter_map(OpenedEntry::record).collect()
    }

    pub fn decrypted_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_decrypted()).count()
    }

    pub fn undecryptable_count(&self) -> usize {
        self.entries.len() - self.decrypted_count()
    }

    /// Same outcome as a [`BatchResult`], keyed by entry id.
    pub fn batch(&self) -> BatchResult<Record> {
        let mut batch = BatchResult::new();
        for entry in &self.entries {
            match &entry.state {
                EntryState::Decrypted(record) => batch.push_ok(record.clone()),
                EntryState::Undecryptable { reason, .. } => batch.push_err(
                    entry.entry_id.to_string(),
                    &Error::Decryption(reason.clone()),
                ),
            }
        }
        batch
    }
}

/// Fetches packages and decrypts them as a viewer address.
pub struct Resolver {
    publisher: Arc<Publisher>,
    cipher: RecipientCipher,
}

impl Resolver {
    pub fn new(publisher: Arc<Publisher>, cipher: RecipientCipher) -> Self {
        Self { publisher, cipher }
    }

    /// Open the package a registry record points at.
    pub async fn open(&self, share: &ShareRecord, viewer: &str) -> Result<OpenedShare> {
        if !share.recipient.eq_ignore_ascii_case(viewer.trim()) {
            debug!(
                content_id = %share.content_id,
                "Viewer is not the registered recipient; entries will likely not decrypt"
            );
        }
        self.open_content(&share.content_id, viewer).await
    }

    /// Open a package by content id.
    ///
    /// Fetch and parse failures fail the call. Per-entry failures do not.
    pub async fn open_content(&self, content_id: &str, viewer: &str) -> Result<OpenedShare> {
        let viewer = normalize_address(viewer)?;
        let package = self.publisher.fetch_package(content_id).await?;

        // Constant-salt packages share one key across every entry.
        let mut keys: HashMap<String, DerivedKey> = HashMap::new();
        let mut entries = Vec::with_capacity(package.entries.len());
        for entry in package.entries {
            trace!(entry_id = entry.entry_id, "Opening share entry");
            let state = match self.decrypt_entry(&viewer, &entry.encrypted_data, &mut keys).await {
                Ok(record) => EntryState::Decrypted(record),
                Err(e) => {
                    warn!(
                        content_id,
                        entry_id = entry.entry_id,
                        error = %e,
                        "Share entry could not be decrypted"
                    );
                    EntryState::Undecryptable {
                        envelope: entry.encrypted_data,
                        reason: e.to_string(),
                    }
                }
            };
            entries.push(OpenedEntry {
                entry_id: entry.entry_id,
                timestamp: entry.timestamp,
                local_timestamp: entry.local_timestamp,
                state,
            });
        }

        let opened = OpenedShare {
            content_id: content_id.to_string(),
            metadata: package.metadata,
            entries,
        };
        debug!(
            content_id,
            decrypted = opened.decrypted_count(),
            undecryptable = opened.undecryptable_count(),
            "Opened share"
        );
        Ok(opened)
    }

    async fn decrypt_entry(
        &self,
        viewer: &str,
        envelope: &EncryptedEnvelope,
        keys: &mut HashMap<String, DerivedKey>,
    ) -> Result<Record> {
        envelope.check_version()?;
        let key = match keys.get(&envelope.salt) {
            Some(key) => key.clone(),
            None => {
                let key = self.cipher.key_for(viewer, &envelope.salt).await?;
                keys.insert(envelope.salt.clone(), key.clone());
                key
            }
        };
        let plaintext = envelope.open(&key)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| Error::Decryption(format!("entry is not a record: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunara_core::ShareType;

    fn share(sender: &str, timestamp: u64, content_id: &str) -> ShareRecord {
        ShareRecord {
            content_id: content_id.into(),
            sender: sender.into(),
            recipient: "0xme".into(),
            share_type: ShareType::Partner,
            timestamp,
        }
    }

    #[test]
    fn test_latest_per_sender() {
        let records = vec![share("0xA", 1, "a1"), share("0xB", 2, "b2"), share("0xA", 3, "a3")];
        let latest = resolve_latest_per_sender(&records);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest["0xa"].content_id, "a3");
        assert_eq!(latest["0xb"].content_id, "b2");
    }

    #[test]
    fn test_latest_tie_first_seen_wins() {
        let records = vec![share("0xA", 5, "first"), share("0xa", 5, "second")];
        let latest = resolve_latest_per_sender(&records);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest["0xa"].content_id, "first");
    }

    #[test]
    fn test_latest_empty() {
        assert!(resolve_latest_per_sender(&[]).is_empty());
    }

    #[test]
    fn test_opened_share_batch() {
        let envelope = EncryptedEnvelope {
            version: "v1".into(),
            salt: "s".into(),
            nonce: String::new(),
            ciphertext: String::new(),
            tag: String::new(),
        };
        let opened = OpenedShare {
            content_id: "cid".into(),
            metadata: SharePackageMetadata {
                shared_by: "did:x".into(),
                shared_at: 0,
                share_type: ShareType::Family,
                total_entries: 1,
            },
            entries: vec![OpenedEntry {
                entry_id: 4,
                timestamp: 0,
                local_timestamp: 0,
                state: EntryState::Undecryptable {
                    envelope,
                    reason: "authentication failed".into(),
                },
            }],
        };
        assert_eq!(opened.undecryptable_count(), 1);
        assert!(opened.records().is_empty());
        let batch = opened.batch();
        assert_eq!(batch.failed[0].key, "4");
        assert!(batch.failed[0].decryption);
    }
}
