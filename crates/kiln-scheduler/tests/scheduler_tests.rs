//! Job scheduling: submission, dedup and replacement of finished jobs.

mod common;

use async_trait::async_trait;
use chrono::Duration;
use common::Harness;
use kiln_core::cluster::JobState;
use kiln_core::{Clock, Error, JobId, Snapshot};
use kiln_db::{DbResult, SnapshotRepo};
use kiln_test_utils::{MemoryCluster, MemorySnapshotRepo, commit};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[tokio::test]
async fn test_worked_example() {
    let h = Harness::new(vec![commit("abc1234", "azuresdkci")]);

    let report = h.service.sync().await.unwrap();
    assert_eq!(report.created, 1);
    assert!(h.service.get("abc1234").await.unwrap().ignored);

    let snapshot = h.service.rebuild("abc1234").await.unwrap();
    assert_eq!(
        snapshot.job_id,
        Some(JobId::new("build-abc1234-20180301080000"))
    );
    assert_eq!(snapshot.job_last_checked_at, Some(h.clock.now()));

    let submissions = h.cluster.submissions();
    assert_eq!(submissions.len(), 1);
    let submission = &submissions[0];
    assert_eq!(submission.pool.id, "builders");
    assert_eq!(submission.metadata.usage, "build");
    assert_eq!(submission.metadata.source_commit, "abc1234");

    let ids: Vec<_> = submission.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["build", "report"]);

    let build = &submission.tasks[0];
    assert!(build.satisfy_dependents_on_failure);
    assert_eq!(build.output_files.len(), 1);
    assert_eq!(build.output_files[0].path, "product-abc1234.tar");
    assert!(build.output_files[0].container_url.starts_with("memory://builds?"));

    let report = &submission.tasks[1];
    assert_eq!(report.depends_on, vec!["build".to_string()]);
    assert!(
        report
            .command_line
            .contains("https://kiln.example.com/api/snapshot/abc1234")
    );
}

#[tokio::test]
async fn test_live_job_is_reused() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);

    let first = h.service.rebuild("abc1234").await.unwrap();
    h.clock.advance(Duration::minutes(5));
    let second = h.service.rebuild("abc1234").await.unwrap();

    assert_eq!(first.job_id, second.job_id);
    assert_eq!(h.cluster.submissions().len(), 1);
}

#[tokio::test]
async fn test_unknown_job_state_counts_as_live() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);

    let first = h.service.rebuild("abc1234").await.unwrap();
    h.cluster
        .set_job_state(first.job_id.as_ref().unwrap(), JobState::Unknown);
    h.clock.advance(Duration::minutes(5));
    h.service.rebuild("abc1234").await.unwrap();

    assert_eq!(h.cluster.submissions().len(), 1);
}

#[tokio::test]
async fn test_completed_job_is_replaced() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);

    let first = h.service.rebuild("abc1234").await.unwrap();
    let first_id = first.job_id.clone().unwrap();
    h.cluster.set_job_state(&first_id, JobState::Completed);
    h.clock.advance(Duration::minutes(5));

    let second = h.service.rebuild("abc1234").await.unwrap();
    let second_id = second.job_id.clone().unwrap();
    assert_ne!(first_id, second_id);
    assert_eq!(second_id.as_str(), "build-abc1234-20180301080500");

    let submissions = h.cluster.submissions();
    assert_eq!(submissions.len(), 2);
    assert_ne!(
        submissions[0].metadata.secret.expose(),
        submissions[1].metadata.secret.expose()
    );

    let stored = h.service.get("abc1234").await.unwrap();
    assert_eq!(stored.job_id, Some(second_id));
}

#[tokio::test]
async fn test_vanished_job_is_replaced() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);

    let first = h.service.rebuild("abc1234").await.unwrap();
    h.cluster.remove_job(first.job_id.as_ref().unwrap());
    h.clock.advance(Duration::minutes(1));

    let second = h.service.rebuild("abc1234").await.unwrap();
    assert_ne!(first.job_id, second.job_id);
    assert_eq!(h.cluster.submissions().len(), 2);
}

#[tokio::test]
async fn test_unknown_commit_is_ingested_from_feed() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);
    assert!(h.registry.is_empty());

    let snapshot = h.service.rebuild("abc1234").await.unwrap();
    assert_eq!(snapshot.author, "Jane Doe");
    assert_eq!(h.registry.len(), 1);
}

#[tokio::test]
async fn test_commit_unknown_to_feed_is_not_found() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);

    let err = h.service.rebuild("fff0000").await.unwrap_err();
    assert!(matches!(err, Error::SnapshotNotFound(_)));
    assert!(h.cluster.submissions().is_empty());
}

#[tokio::test]
async fn test_missing_pool() {
    let h = Harness::with_cluster(
        vec![commit("abc1234", "Jane Doe")],
        MemoryCluster::new().with_pool("general", "test"),
    );

    let err = h.service.rebuild("abc1234").await.unwrap_err();
    assert!(matches!(err, Error::PoolNotFound(ref usage) if usage == "build"));
    assert!(h.service.get("abc1234").await.unwrap().job_id.is_none());
}

#[tokio::test]
async fn test_concurrent_rebuilds_submit_once() {
    let h = Arc::new(Harness::new(vec![commit("abc1234", "Jane Doe")]));

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move { h.service.rebuild("abc1234").await.unwrap() })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(h.cluster.submissions().len(), 1);
}

/// Registry that lets another writer record a job right before the first
/// compare-and-swap, as a second process would.
struct RacingRepo {
    inner: Arc<MemorySnapshotRepo>,
    raced: AtomicBool,
}

#[async_trait]
impl SnapshotRepo for RacingRepo {
    async fn get(&self, commit_id: &str) -> DbResult<Option<Snapshot>> {
        self.inner.get(commit_id).await
    }

    async fn insert_if_absent(&self, snapshot: &Snapshot) -> DbResult<(Snapshot, bool)> {
        self.inner.insert_if_absent(snapshot).await
    }

    async fn save(&self, snapshot: &Snapshot) -> DbResult<()> {
        self.inner.save(snapshot).await
    }

    async fn swap_job(&self, snapshot: &Snapshot, expected: Option<&JobId>) -> DbResult<bool> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let mut rival = snapshot.clone();
            rival.job_id = Some(JobId::new("build-abc1234-rival"));
            self.inner.swap_job(&rival, expected).await?;
        }
        self.inner.swap_job(snapshot, expected).await
    }

    async fn set_ignored(&self, commit_id: &str) -> DbResult<Snapshot> {
        self.inner.set_ignored(commit_id).await
    }

    async fn list(&self, include_ignored: bool, limit: i64) -> DbResult<Vec<Snapshot>> {
        self.inner.list(include_ignored, limit).await
    }

    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_lost_race_is_conflict() {
    let registry = Arc::new(MemorySnapshotRepo::new());
    let repo = Arc::new(RacingRepo {
        inner: registry.clone(),
        raced: AtomicBool::new(false),
    });
    let h = Harness::with_registry(
        vec![commit("abc1234", "Jane Doe")],
        MemoryCluster::new().with_pool("builders", "build"),
        registry,
        repo,
    );

    let err = h.service.rebuild("abc1234").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let stored = h.registry.get("abc1234").await.unwrap().unwrap();
    assert_eq!(stored.job_id, Some(JobId::new("build-abc1234-rival")));
}
