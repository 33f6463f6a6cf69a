//! Gateways and settings shared by every operation.

use kiln_config::SystemConfig;
use kiln_core::Clock;
use kiln_core::artifact::ObjectStore;
use kiln_core::cluster::ComputeCluster;
use kiln_core::source::SourceFeed;
use kiln_db::SnapshotRepo;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::{CommitLocks, RetryPolicy};

/// External collaborators, injected as trait objects.
#[derive(Clone)]
pub struct Gateways {
    pub registry: Arc<dyn SnapshotRepo>,
    pub source: Arc<dyn SourceFeed>,
    pub cluster: Arc<dyn ComputeCluster>,
    pub store: Arc<dyn ObjectStore>,
    pub clock: Arc<dyn Clock>,
}

/// Tunables the scheduling operations read from configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL the report task calls back on.
    pub public_url: String,
    pub automation_author: String,
    pub pool_usage: String,
    pub container: String,
    pub product: String,
    pub download_ttl: Duration,
    pub upload_ttl: Duration,
    pub build_commands: Vec<String>,
    pub output_dir: String,
    pub build_env: HashMap<String, String>,
    pub sync_limit: usize,
}

impl Settings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            public_url: config.server.public_url.clone(),
            automation_author: config.source.automation_author.clone(),
            pool_usage: config.cluster.pool_usage.clone(),
            container: config.storage.container.clone(),
            product: config.storage.product.clone(),
            download_ttl: config.storage.download_ttl(),
            upload_ttl: config.storage.upload_ttl(),
            build_commands: config.build.commands.clone(),
            output_dir: config.build.output_dir.clone(),
            build_env: config.build.env.clone(),
            sync_limit: config.source.sync_limit,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:3000".to_string(),
            automation_author: "azuresdkci".to_string(),
            pool_usage: "build".to_string(),
            container: "builds".to_string(),
            product: "azure-cli".to_string(),
            download_ttl: Duration::from_secs(365 * 24 * 60 * 60),
            upload_ttl: Duration::from_secs(24 * 60 * 60),
            build_commands: vec!["./scripts/ci/build.sh".to_string()],
            output_dir: "artifacts".to_string(),
            build_env: HashMap::new(),
            sync_limit: 100,
        }
    }
}

/// Everything an operation needs: gateways, settings, the per-commit lock
/// table and the retry policy for idempotent reads.
///
/// One context is shared by all components of a process so that they
/// serialize on the same locks.
pub struct Context {
    pub gateways: Gateways,
    pub settings: Settings,
    pub locks: CommitLocks,
    pub retry: RetryPolicy,
}

impl Context {
    pub fn new(gateways: Gateways, settings: Settings, retry: RetryPolicy) -> Arc<Self> {
        Arc::new(Self {
            gateways,
            settings,
            locks: CommitLocks::new(),
            retry,
        })
    }
}
