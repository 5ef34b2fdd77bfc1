//! Publishing share packages to content-addressed storage.

use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use lunara_core::config::LunaraConfig;
use lunara_core::retry::{retry_async, retry_async_if, RetryPolicy};
use lunara_core::traits::BlobStore;
use lunara_core::{Error, Result, ShareType};

use crate::link::build_shareable_link;
use crate::package::SharePackage;

/// Where a package landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub content_id: String,
    pub gateway_url: String,
    /// Serialized package size in bytes.
    pub size: usize,
    pub name: String,
}

/// Uploads and fetches packages through a [`BlobStore`].
pub struct Publisher {
    blobs: Arc<dyn BlobStore>,
    gateway_host: String,
    app_base_url: Url,
    retry: RetryPolicy,
}

impl Publisher {
    pub fn new(blobs: Arc<dyn BlobStore>, config: &LunaraConfig) -> Result<Self> {
        let app_base_url = Url::parse(&config.app_base_url)
            .map_err(|e| Error::Config(format!("app base url: {}", e)))?;
        Ok(Self {
            blobs,
            gateway_host: config.gateway_host.clone(),
            app_base_url,
            retry: config.network_retry.clone(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Public gateway URL for a content id.
    pub fn gateway_url(&self, content_id: &str) -> String {
        format!("https://{}/ipfs/{}", self.gateway_host, content_id)
    }

    /// Shareable app link for a content id.
    pub fn shareable_link(&self, content_id: &str, share_type: ShareType) -> Result<String> {
        build_shareable_link(&self.app_base_url, content_id, share_type)
    }

    /// Serialize and upload a package.
    pub async fn publish(&self, package: &SharePackage) -> Result<PublishReceipt> {
        let bytes = package.to_json_bytes()?;
        let name = package.upload_name();
        let size = bytes.len();
        let blobs = self.blobs.as_ref();
        let name_ref = name.as_str();

        let content_id = retry_async(&self.retry, "publish", |_| {
            let bytes = bytes.clone();
            async move { blobs.upload(bytes, name_ref).await }
        })
        .await?;

        if content_id.is_empty() {
            return Err(Error::Publish("store returned an empty content id".to_string()));
        }

        info!(
            content_id = %content_id,
            size,
            entries = package.len(),
            "Published share package"
        );
        Ok(PublishReceipt {
            gateway_url: self.gateway_url(&content_id),
            content_id,
            size,
            name,
        })
    }

    /// Fetch raw bytes. Not-found is retried since fresh content may still be
    /// propagating.
    pub async fn fetch(&self, content_id: &str) -> Result<Vec<u8>> {
        let blobs = self.blobs.as_ref();
        retry_async_if(
            &self.retry,
            "fetch",
            |e| matches!(e, Error::Fetch { .. }),
            |attempt| {
                debug!(content_id, attempt, "Fetching share package");
                blobs.download(content_id)
            },
        )
        .await
    }

    /// Fetch and parse a package.
    pub async fn fetch_package(&self, content_id: &str) -> Result<SharePackage> {
        let bytes = self.fetch(content_id).await?;
        SharePackage::from_json_bytes(&bytes)
    }

    /// Whether a content id resolves right now. No retries.
    pub async fn is_accessible(&self, content_id: &str) -> bool {
        match self.blobs.exists(content_id).await {
            Ok(exists) => exists,
            Err(e) => {
                debug!(content_id, error = %e, "Accessibility check failed");
                false
            }
        }
    }
}
