//! Azure Blob artifact store.
//!
//! Download and upload URLs are service SAS tokens signed locally with the
//! storage account key; no request is made to mint them.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use kiln_core::artifact::ObjectStore;
use kiln_core::{Clock, Error, Result};
use reqwest::StatusCode;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const SAS_VERSION: &str = "2020-12-06";
/// Lifetime of the SAS used for existence probes.
const PROBE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct BlobStoreConfig {
    pub account: String,
    /// Base64 account key.
    pub key: String,
    /// Service endpoint, e.g. `https://<account>.blob.core.windows.net`.
    pub endpoint: String,
    pub timeout: Duration,
}

impl BlobStoreConfig {
    pub fn from_config(storage: &kiln_config::StorageConfig, timeout: Duration) -> Result<Self> {
        let key = storage
            .key
            .clone()
            .ok_or_else(|| Error::InvalidInput("storage.key is not configured".to_string()))?;
        Ok(Self {
            account: storage.account.clone(),
            key,
            endpoint: storage.blob_endpoint().trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

/// What a SAS token grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SasResource {
    /// Read one blob.
    BlobRead,
    /// Create and write blobs anywhere in a container.
    ContainerWrite,
}

impl SasResource {
    fn code(self) -> &'static str {
        match self {
            SasResource::BlobRead => "b",
            SasResource::ContainerWrite => "c",
        }
    }

    fn permissions(self) -> &'static str {
        match self {
            SasResource::BlobRead => "r",
            SasResource::ContainerWrite => "cw",
        }
    }
}

pub struct AzureBlobStore {
    client: reqwest::Client,
    config: BlobStoreConfig,
    key: Vec<u8>,
    clock: Arc<dyn Clock>,
}

impl AzureBlobStore {
    pub fn new(config: BlobStoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let key = STANDARD
            .decode(config.key.trim())
            .map_err(|e| Error::InvalidInput(format!("storage key is not base64: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            key,
            clock,
        })
    }

    fn resource_url(&self, container: &str, blob: Option<&str>) -> String {
        match blob {
            Some(blob) => format!(
                "{}/{}/{}",
                self.config.endpoint,
                container,
                urlencoding::encode(blob)
            ),
            None => format!("{}/{}", self.config.endpoint, container),
        }
    }

    /// Query string of a service SAS.
    fn sas(
        &self,
        resource: SasResource,
        container: &str,
        blob: Option<&str>,
        ttl: Duration,
    ) -> Result<String> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::InvalidInput(format!("SAS lifetime out of range: {}", e)))?;
        let expiry = format_time(self.clock.now() + ttl);

        let canonical = match blob {
            Some(blob) => format!("/blob/{}/{}/{}", self.config.account, container, blob),
            None => format!("/blob/{}/{}", self.config.account, container),
        };
        let string_to_sign = [
            resource.permissions(),
            "",
            expiry.as_str(),
            canonical.as_str(),
            "",
            "",
            "https",
            SAS_VERSION,
            resource.code(),
            "",
            "",
            "",
            "",
            "",
            "",
            "",
        ]
        .join("\n");

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| Error::Internal(format!("Invalid storage key: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!(
            "sv={}&sr={}&sp={}&se={}&spr=https&sig={}",
            SAS_VERSION,
            resource.code(),
            resource.permissions(),
            urlencoding::encode(&expiry),
            urlencoding::encode(&signature)
        ))
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    async fn exists(&self, container: &str, blob: &str) -> Result<bool> {
        let url = format!(
            "{}?{}",
            self.resource_url(container, Some(blob)),
            self.sas(SasResource::BlobRead, container, Some(blob), PROBE_TTL)?
        );

        let response = self
            .client
            .head(&url)
            .header("x-ms-version", SAS_VERSION)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("blob probe failed: {}", e)))?;

        let status = response.status();
        debug!(container = %container, blob = %blob, status = %status, "Probed artifact");
        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                Err(Error::Upstream(format!("blob store returned {}", s)))
            }
            s => Err(Error::Internal(format!("blob store returned {}", s))),
        }
    }

    async fn signed_url(&self, container: &str, blob: &str, ttl: Duration) -> Result<String> {
        Ok(format!(
            "{}?{}",
            self.resource_url(container, Some(blob)),
            self.sas(SasResource::BlobRead, container, Some(blob), ttl)?
        ))
    }

    async fn upload_url(&self, container: &str, ttl: Duration) -> Result<String> {
        Ok(format!(
            "{}?{}",
            self.resource_url(container, None),
            self.sas(SasResource::ContainerWrite, container, None, ttl)?
        ))
    }
}
