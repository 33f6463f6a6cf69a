//! Test harness wiring a SnapshotService to in-memory gateways.

#![allow(dead_code)]

use kiln_core::CommitInfo;
use kiln_db::SnapshotRepo;
use kiln_scheduler::{Gateways, RetryPolicy, Settings, SnapshotService};
use kiln_test_utils::{
    ManualClock, MemoryCluster, MemoryObjectStore, MemorySnapshotRepo, MemorySourceFeed,
};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub service: SnapshotService,
    pub registry: Arc<MemorySnapshotRepo>,
    pub source: Arc<MemorySourceFeed>,
    pub cluster: Arc<MemoryCluster>,
    pub store: Arc<MemoryObjectStore>,
    pub clock: Arc<ManualClock>,
}

pub fn settings() -> Settings {
    Settings {
        public_url: "https://kiln.example.com".to_string(),
        product: "product".to_string(),
        ..Settings::default()
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        base: Duration::from_millis(1),
        max: Duration::from_millis(2),
    }
}

impl Harness {
    pub fn new(commits: Vec<CommitInfo>) -> Self {
        Self::with_cluster(commits, MemoryCluster::new().with_pool("builders", "build"))
    }

    pub fn with_cluster(commits: Vec<CommitInfo>, cluster: MemoryCluster) -> Self {
        let registry = Arc::new(MemorySnapshotRepo::new());
        Self::with_registry(commits, cluster, registry.clone(), registry)
    }

    /// Use `repo` as the registry seen by the service while `registry`
    /// stays the inspectable backing store.
    pub fn with_registry(
        commits: Vec<CommitInfo>,
        cluster: MemoryCluster,
        registry: Arc<MemorySnapshotRepo>,
        repo: Arc<dyn SnapshotRepo>,
    ) -> Self {
        let source = Arc::new(MemorySourceFeed::new(commits).with_page_size(10));
        let cluster = Arc::new(cluster);
        let store = Arc::new(MemoryObjectStore::new());
        let clock = Arc::new(ManualClock::default());

        let service = SnapshotService::new(
            Gateways {
                registry: repo,
                source: source.clone(),
                cluster: cluster.clone(),
                store: store.clone(),
                clock: clock.clone(),
            },
            settings(),
            fast_retry(),
        );

        Self {
            service,
            registry,
            source,
            cluster,
            store,
            clock,
        }
    }
}
