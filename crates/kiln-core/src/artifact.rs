//! Object store abstraction for build artifacts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Result;

/// Where the build artifact of a commit lives.
///
/// The blob name must match what the build task uploads byte for byte, so
/// both the scheduler and the refresher derive it here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub container: String,
    pub blob: String,
}

impl ArtifactLocation {
    pub fn for_commit(container: &str, product: &str, commit_id: &str) -> Self {
        Self {
            container: container.to_string(),
            blob: artifact_name(product, commit_id),
        }
    }
}

/// `<product>-<commit_id>.tar`
pub fn artifact_name(product: &str, commit_id: &str) -> String {
    format!("{product}-{commit_id}.tar")
}

/// Trait for object stores holding build artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether a blob exists.
    async fn exists(&self, container: &str, blob: &str) -> Result<bool>;

    /// Mint a read-only download URL valid for `ttl`.
    async fn signed_url(&self, container: &str, blob: &str, ttl: Duration) -> Result<String>;

    /// Mint a write-capable container URL valid for `ttl`, used by the
    /// build task to upload its output.
    async fn upload_url(&self, container: &str, ttl: Duration) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name() {
        assert_eq!(artifact_name("product", "abc1234"), "product-abc1234.tar");
        let location = ArtifactLocation::for_commit("builds", "azure-cli", "abc1234");
        assert_eq!(location.container, "builds");
        assert_eq!(location.blob, "azure-cli-abc1234.tar");
    }
}
