//! Registry client.
//!
//! Wraps a [`ShareRegistry`] with share-type encoding, funding-error
//! classification and retries for transient failures.

use std::sync::Arc;

use tracing::{info, warn};

use lunara_core::retry::{retry_async, RetryPolicy};
use lunara_core::traits::{RegistryEntry, ShareRecord, ShareRegistry};
use lunara_core::{Error, Result, ShareType};

/// Map a raw registry write failure to the error the caller should see.
fn classify_write_error(sender: &str, e: Error) -> Error {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("insufficient funds") || lower.contains("insufficient_funds") {
        Error::InsufficientFunds {
            address: sender.to_string(),
            message,
        }
    } else if lower.contains("user rejected") || lower.contains("user denied") {
        Error::SignatureRejected(message)
    } else {
        e
    }
}

fn decode(entries: Vec<RegistryEntry>) -> Vec<ShareRecord> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let content_id = entry.content_id.clone();
            match ShareRecord::try_from(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(content_id = %content_id, error = %e, "Skipping registry entry");
                    None
                }
            }
        })
        .collect()
}

/// Typed access to the share registry.
pub struct RegistryClient {
    registry: Arc<dyn ShareRegistry>,
    retry: RetryPolicy,
}

impl RegistryClient {
    pub fn new(registry: Arc<dyn ShareRegistry>, retry: RetryPolicy) -> Self {
        Self { registry, retry }
    }

    /// Append a share tuple. Returns the transaction receipt id.
    ///
    /// Funding problems surface as `InsufficientFunds` and are never retried.
    pub async fn record(
        &self,
        sender: &str,
        recipient: &str,
        content_id: &str,
        share_type: ShareType,
    ) -> Result<String> {
        let registry = self.registry.as_ref();
        let tx = retry_async(&self.retry, "registry_record", |_| async move {
            registry
                .record(sender, recipient, content_id, share_type.code())
                .await
                .map_err(|e| classify_write_error(sender, e))
        })
        .await?;
        info!(
            content_id,
            share_type = %share_type,
            tx = %tx,
            "Recorded share in registry"
        );
        Ok(tx)
    }

    /// Shares sent by `address`, oldest first. Unknown share-type codes are skipped.
    pub async fn list_sent_by(&self, address: &str) -> Result<Vec<ShareRecord>> {
        let registry = self.registry.as_ref();
        let entries = retry_async(&self.retry, "registry_list_sent", |_| {
            registry.list_sent_by(address)
        })
        .await?;
        Ok(sorted(decode(entries)))
    }

    /// Shares addressed to `address`, oldest first. Unknown share-type codes are skipped.
    pub async fn list_received_by(&self, address: &str) -> Result<Vec<ShareRecord>> {
        let registry = self.registry.as_ref();
        let entries = retry_async(&self.retry, "registry_list_received", |_| {
            registry.list_received_by(address)
        })
        .await?;
        Ok(sorted(decode(entries)))
    }

    pub async fn count_sent_by(&self, address: &str) -> Result<usize> {
        Ok(self.list_sent_by(address).await?.len())
    }

    pub async fn count_received_by(&self, address: &str) -> Result<usize> {
        Ok(self.list_received_by(address).await?.len())
    }
}

fn sorted(mut records: Vec<ShareRecord>) -> Vec<ShareRecord> {
    // Stable, so equal timestamps keep ledger order.
    records.sort_by_key(|r| r.timestamp);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryShareRegistry;
    use std::time::Duration;

    fn client(registry: Arc<MemoryShareRegistry>) -> RegistryClient {
        RegistryClient::new(
            registry,
            RetryPolicy::network().with_base_delay(Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_record_and_list() {
        let registry = Arc::new(MemoryShareRegistry::new());
        let client = client(registry.clone());
        let tx = client
            .record("0xA", "0xB", "cid1", ShareType::Doctor)
            .await
            .unwrap();
        assert!(tx.starts_with("0x"));

        let sent = client.list_sent_by("0xA").await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].share_type, ShareType::Doctor);
        assert_eq!(registry.entries()[0].share_type_code, 2);
        assert_eq!(client.count_received_by("0xB").await.unwrap(), 1);
        assert_eq!(client.count_received_by("0xC").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_funds_not_retried() {
        let registry = Arc::new(MemoryShareRegistry::new());
        registry.mark_unfunded("0xA");
        let err = client(registry.clone())
            .record("0xA", "0xB", "cid1", ShareType::Partner)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { ref address, .. } if address == "0xA"));
        assert_eq!(registry.write_attempts(), 1);
    }

    #[tokio::test]
    async fn test_transient_write_retried() {
        let registry = Arc::new(MemoryShareRegistry::new());
        registry.fail_next_writes(2);
        client(registry.clone())
            .record("0xA", "0xB", "cid1", ShareType::Partner)
            .await
            .unwrap();
        assert_eq!(registry.write_attempts(), 3);
    }

    #[tokio::test]
    async fn test_unknown_codes_skipped() {
        let registry = Arc::new(MemoryShareRegistry::new());
        registry.insert_raw(RegistryEntry {
            content_id: "future".into(),
            sender: "0xA".into(),
            recipient: "0xB".into(),
            share_type_code: 7,
            timestamp: 5,
        });
        let client = client(registry);
        client.record("0xA", "0xB", "cid1", ShareType::Family).await.unwrap();
        let received = client.list_received_by("0xB").await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].content_id, "cid1");
    }

    #[test]
    fn test_classify_write_errors() {
        let funds = classify_write_error("0xA", Error::RegistryWrite("INSUFFICIENT_FUNDS".into()));
        assert!(matches!(funds, Error::InsufficientFunds { .. }));
        let rejected = classify_write_error("0xA", Error::RegistryWrite("User rejected the request".into()));
        assert!(matches!(rejected, Error::SignatureRejected(_)));
        let other = classify_write_error("0xA", Error::RegistryWrite("nonce too low".into()));
        assert!(matches!(other, Error::RegistryWrite(_)));
    }
}
