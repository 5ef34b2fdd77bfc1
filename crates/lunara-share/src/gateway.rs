//! HTTP blob store backed by a pinning service and a public IPFS gateway.
//!
//! Uploads go to `POST {api}/pinning/pinFileToIPFS` as multipart with a bearer
//! JWT; downloads and existence checks go to `https://{gateway}/ipfs/{cid}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use lunara_core::config::LunaraConfig;
use lunara_core::traits::BlobStore;
use lunara_core::{Error, Result};

#[derive(Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// [`BlobStore`] over a Pinata-compatible pinning API.
pub struct PinataBlobStore {
    client: Client,
    api_url: String,
    gateway_base: String,
    jwt: Option<String>,
}

impl std::fmt::Debug for PinataBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinataBlobStore")
            .field("api_url", &self.api_url)
            .field("gateway_base", &self.gateway_base)
            .field("jwt", &self.jwt.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl PinataBlobStore {
    pub fn new(config: &LunaraConfig) -> Result<Self> {
        Self::with_timeout(config, config.http_timeout)
    }

    pub fn with_timeout(config: &LunaraConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            api_url = %config.pinning_api_url,
            gateway = %config.gateway_host,
            "Initializing pinning blob store"
        );

        Ok(Self {
            client,
            api_url: config.pinning_api_url.trim_end_matches('/').to_string(),
            gateway_base: format!("https://{}", config.gateway_host),
            jwt: config.pinning_jwt.clone(),
        })
    }

    /// Read through a different gateway origin, e.g. `http://127.0.0.1:8080`.
    pub fn with_gateway_base(mut self, base: impl Into<String>) -> Self {
        self.gateway_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn content_url(&self, content_id: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_base, content_id)
    }
}

fn fetch_err(content_id: &str, not_found: bool, message: impl Into<String>) -> Error {
    Error::Fetch {
        content_id: content_id.to_string(),
        not_found,
        message: message.into(),
    }
}

#[async_trait]
impl BlobStore for PinataBlobStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<String> {
        let jwt = self
            .jwt
            .as_deref()
            .ok_or_else(|| Error::Config("pinning JWT is not configured".to_string()))?;
        let url = format!("{}/pinning/pinFileToIPFS", self.api_url);
        let size = bytes.len();

        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str("application/json")
            .map_err(|e| Error::Internal(format!("Failed to create multipart: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("pinataMetadata", serde_json::json!({ "name": name }).to_string());

        let response = self
            .client
            .post(&url)
            .bearer_auth(jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Publish(format!("Pin request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Config(format!(
                "pinning service rejected credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Publish(format!(
                "Pinning API returned {}: {}",
                status, body
            )));
        }

        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| Error::Publish(format!("Failed to parse pin response: {}", e)))?;
        debug!(content_id = %pinned.ipfs_hash, size, "Pinned blob");
        Ok(pinned.ipfs_hash)
    }

    async fn download(&self, content_id: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.content_url(content_id))
            .send()
            .await
            .map_err(|e| fetch_err(content_id, false, format!("request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(fetch_err(content_id, true, "gateway returned 404")),
            status if !status.is_success() => Err(fetch_err(
                content_id,
                false,
                format!("gateway returned {}", status),
            )),
            _ => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| fetch_err(content_id, false, format!("body read failed: {}", e)))?;
                Ok(bytes.to_vec())
            }
        }
    }

    async fn exists(&self, content_id: &str) -> Result<bool> {
        let response = self
            .client
            .head(self.content_url(content_id))
            .send()
            .await
            .map_err(|e| fetch_err(content_id, false, format!("request failed: {}", e)))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(fetch_err(
                content_id,
                false,
                format!("gateway returned {}", status),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer, jwt: Option<&str>) -> PinataBlobStore {
        let config = LunaraConfig {
            pinning_api_url: server.uri(),
            pinning_jwt: jwt.map(str::to_string),
            ..Default::default()
        };
        PinataBlobStore::new(&config)
            .unwrap()
            .with_gateway_base(server.uri())
    }

    #[tokio::test]
    async fn test_upload_returns_ipfs_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .and(header("authorization", "Bearer test-jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "IpfsHash": "QmTestHash",
                "PinSize": 120,
                "Timestamp": "2024-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cid = store(&server, Some("test-jwt"))
            .upload(b"{}".to_vec(), "cycle-share-partner-1-x.json")
            .await
            .unwrap();
        assert_eq!(cid, "QmTestHash");
    }

    #[tokio::test]
    async fn test_upload_without_jwt_is_config_error() {
        let server = MockServer::start().await;
        let err = store(&server, None)
            .upload(b"{}".to_vec(), "x.json")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_upload_server_error_is_publish_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let err = store(&server, Some("jwt"))
            .upload(b"{}".to_vec(), "x.json")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Publish(ref m) if m.contains("503")));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_upload_bad_credentials_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = store(&server, Some("expired"))
            .upload(b"{}".to_vec(), "x.json")
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_download_and_exists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipfs/QmPresent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"entries\":[]}"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/ipfs/QmPresent"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = store(&server, None);
        assert_eq!(
            store.download("QmPresent").await.unwrap(),
            b"{\"entries\":[]}".to_vec()
        );
        assert!(store.exists("QmPresent").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_content_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server, None);
        assert!(matches!(
            store.download("QmGone").await,
            Err(Error::Fetch { not_found: true, .. })
        ));
        assert!(!store.exists("QmGone").await.unwrap());
    }

    #[test]
    fn test_debug_redacts_jwt() {
        let config = LunaraConfig {
            pinning_jwt: Some("secret-jwt".into()),
            ..Default::default()
        };
        let store = PinataBlobStore::new(&config).unwrap();
        let debug = format!("{:?}", store);
        assert!(!debug.contains("secret-jwt"));
        assert!(debug.contains("https://gateway.pinata.cloud"));
    }
}
