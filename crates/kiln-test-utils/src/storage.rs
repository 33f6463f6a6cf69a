//! In-memory artifact store.

use async_trait::async_trait;
use kiln_core::Result;
use kiln_core::artifact::ObjectStore;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

/// Object store that tracks which blobs exist and hands out
/// `memory://` URLs in place of signed ones.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    blobs: Mutex<HashSet<(String, String)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a build uploaded `blob` into `container`.
    pub fn put(&self, container: &str, blob: &str) {
        self.blobs
            .lock()
            .unwrap()
            .insert((container.to_string(), blob.to_string()));
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, container: &str, blob: &str) -> Result<bool> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .contains(&(container.to_string(), blob.to_string())))
    }

    async fn signed_url(&self, container: &str, blob: &str, ttl: Duration) -> Result<String> {
        Ok(format!(
            "memory://{container}/{blob}?ttl={}&sig=read",
            ttl.as_secs()
        ))
    }

    async fn upload_url(&self, container: &str, ttl: Duration) -> Result<String> {
        Ok(format!("memory://{container}?ttl={}&sig=write", ttl.as_secs()))
    }
}
