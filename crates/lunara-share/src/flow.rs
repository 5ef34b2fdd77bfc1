//! Share orchestration: package, publish, register.
//!
//! The three steps are not transactional. Once the package is published the
//! blob cannot be withdrawn, so a registry failure after that point surfaces
//! as [`Error::PublishedNotRegistered`] carrying the content id, and
//! [`ShareFlow::retry_registration`] finishes the job later.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, instrument};

use lunara_core::config::LunaraConfig;
use lunara_core::traits::{BlobStore, ShareRecord, ShareRegistry};
use lunara_core::{Error, FailureInfo, Result, ShareType};
use lunara_crypto::{normalize_address, Session};

use crate::packager::{Packager, ShareInput};
use crate::publisher::Publisher;
use crate::registry::RegistryClient;
use crate::resolver::{resolve_latest_per_sender, OpenedShare, Resolver};

/// Everything a completed share produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareOutcome {
    pub content_id: String,
    pub gateway_url: String,
    pub link: String,
    pub transaction_id: String,
    pub share_type: ShareType,
    pub total_entries: usize,
    /// Inputs dropped because they failed the sender-side decrypt.
    pub dropped: Vec<FailureInfo>,
}

/// Sender and recipient workflows for one session.
pub struct ShareFlow {
    session: Arc<Session>,
    packager: Packager,
    publisher: Arc<Publisher>,
    registry: RegistryClient,
    resolver: Resolver,
}

impl ShareFlow {
    pub fn new(
        session: Arc<Session>,
        blobs: Arc<dyn BlobStore>,
        registry: Arc<dyn ShareRegistry>,
        config: &LunaraConfig,
    ) -> Result<Self> {
        let publisher = Arc::new(Publisher::new(blobs, config)?);
        Ok(Self::from_parts(
            session,
            publisher,
            RegistryClient::new(registry, config.network_retry.clone()),
        ))
    }

    pub fn from_parts(session: Arc<Session>, publisher: Arc<Publisher>, registry: RegistryClient) -> Self {
        let resolver = Resolver::new(publisher.clone(), *session.recipient_cipher());
        Self {
            packager: Packager::new(session.clone()),
            session,
            publisher,
            registry,
            resolver,
        }
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Share records with `recipient`.
    #[instrument(skip(self, inputs), fields(inputs = inputs.len()))]
    pub async fn share(
        &self,
        recipient: &str,
        share_type: ShareType,
        inputs: Vec<ShareInput>,
    ) -> Result<ShareOutcome> {
        // Resolve the signer before anything is published.
        let sender = self.session.wallet_address()?;
        let recipient = normalize_address(recipient)?;

        let (package, dropped) = self
            .packager
            .share_data_report(&recipient, share_type, inputs)
            .await?;
        let receipt = self.publisher.publish(&package).await?;
        let link = self.publisher.shareable_link(&receipt.content_id, share_type)?;

        let transaction_id = self
            .registry
            .record(&sender, &recipient, &receipt.content_id, share_type)
            .await
            .map_err(|e| {
                error!(
                    content_id = %receipt.content_id,
                    error = %e,
                    "Share published but registry write failed"
                );
                Error::PublishedNotRegistered {
                    content_id: receipt.content_id.clone(),
                    gateway_url: receipt.gateway_url.clone(),
                    source: Box::new(e),
                }
            })?;

        info!(
            content_id = %receipt.content_id,
            total_entries = package.len(),
            dropped = dropped.len(),
            "Share completed"
        );
        Ok(ShareOutcome {
            content_id: receipt.content_id,
            gateway_url: receipt.gateway_url,
            link,
            transaction_id,
            share_type,
            total_entries: package.len(),
            dropped,
        })
    }

    /// Register an already-published package.
    pub async fn retry_registration(
        &self,
        recipient: &str,
        content_id: &str,
        share_type: ShareType,
    ) -> Result<String> {
        let sender = self.session.wallet_address()?;
        let recipient = normalize_address(recipient)?;
        if !self.publisher.is_accessible(content_id).await {
            return Err(Error::Fetch {
                content_id: content_id.to_string(),
                not_found: true,
                message: "published content is not reachable".to_string(),
            });
        }
        self.registry
            .record(&sender, &recipient, content_id, share_type)
            .await
    }

    /// Shares this wallet has sent.
    pub async fn sent_shares(&self) -> Result<Vec<ShareRecord>> {
        let address = self.session.wallet_address()?;
        self.registry.list_sent_by(&address).await
    }

    /// Shares addressed to this wallet.
    pub async fn received_shares(&self) -> Result<Vec<ShareRecord>> {
        let address = self.session.wallet_address()?;
        self.registry.list_received_by(&address).await
    }

    /// Newest received share per sender.
    pub async fn latest_received(&self) -> Result<BTreeMap<String, ShareRecord>> {
        Ok(resolve_latest_per_sender(&self.received_shares().await?))
    }

    /// Open a share as this wallet.
    pub async fn open(&self, share: &ShareRecord) -> Result<OpenedShare> {
        let viewer = self.session.wallet_address()?;
        self.resolver.open(share, &viewer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBlobStore, MemoryShareRegistry, StaticWallet};
    use chrono::{TimeZone, Utc};
    use lunara_core::models::Record;
    use lunara_core::retry::RetryPolicy;
    use std::time::Duration;

    struct Fixture {
        flow: ShareFlow,
        blobs: Arc<MemoryBlobStore>,
        registry: Arc<MemoryShareRegistry>,
    }

    fn fixture(wallet: StaticWallet) -> Fixture {
        let config = LunaraConfig {
            kdf_iterations: 1_000,
            network_retry: RetryPolicy::network().with_base_delay(Duration::from_millis(1)),
            ..Default::default()
        };
        let session = Arc::new(Session::open(Arc::new(wallet), &config).unwrap());
        let blobs = Arc::new(MemoryBlobStore::new());
        let registry = Arc::new(MemoryShareRegistry::new());
        let flow = ShareFlow::new(session, blobs.clone(), registry.clone(), &config).unwrap();
        Fixture { flow, blobs, registry }
    }

    fn record() -> ShareInput {
        Record::with_id("r1", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()).into()
    }

    #[tokio::test]
    async fn test_share_records_everything() {
        let f = fixture(StaticWallet::new("did:alice", "0xA11CE"));
        let outcome = f
            .flow
            .share("0xABC", ShareType::Partner, vec![record()])
            .await
            .unwrap();

        assert_eq!(outcome.total_entries, 1);
        assert!(outcome.link.ends_with(&format!("/shared/partner/{}", outcome.content_id)));
        let entries = f.registry.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sender, "0xA11CE");
        assert_eq!(entries[0].recipient, "0xabc");
        assert_eq!(entries[0].content_id, outcome.content_id);
    }

    #[tokio::test]
    async fn test_no_wallet_publishes_nothing() {
        let wallet = StaticWallet::new("did:alice", "0xA11CE");
        wallet.disconnect();
        let f = fixture(wallet);
        let err = f
            .flow
            .share("0xABC", ShareType::Partner, vec![record()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationRequired(_)));
        assert!(f.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_unfunded_sender_leaves_published_blob() {
        let f = fixture(StaticWallet::new("did:alice", "0xA11CE"));
        f.registry.mark_unfunded("0xA11CE");

        let err = f
            .flow
            .share("0xABC", ShareType::Doctor, vec![record()])
            .await
            .unwrap_err();
        let (content_id, source) = match err {
            Error::PublishedNotRegistered { content_id, source, .. } => (content_id, source),
            other => panic!("expected PublishedNotRegistered, got {other:?}"),
        };
        assert!(matches!(*source, Error::InsufficientFunds { .. }));
        assert_eq!(f.blobs.len(), 1);

        f.registry.mark_funded("0xA11CE");
        f.flow
            .retry_registration("0xABC", &content_id, ShareType::Doctor)
            .await
            .unwrap();
        assert_eq!(f.flow.sent_shares().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_registration_requires_content() {
        let f = fixture(StaticWallet::new("did:alice", "0xA11CE"));
        let err = f
            .flow
            .retry_registration("0xABC", "b3missing", ShareType::Partner)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { not_found: true, .. }));
        assert!(f.registry.entries().is_empty());
    }
}
