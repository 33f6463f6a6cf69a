//! Sync sweep over the source feed.

mod common;

use common::Harness;
use kiln_core::Error;
use kiln_scheduler::SnapshotAction;
use kiln_test_utils::{commit, history};

#[tokio::test]
async fn test_sync_is_idempotent() {
    let h = Harness::new(history(25));

    let first = h.service.sync().await.unwrap();
    assert_eq!((first.seen, first.created), (25, 25));

    let second = h.service.sync().await.unwrap();
    assert_eq!((second.seen, second.created), (25, 0));
    assert_eq!(h.registry.len(), 25);
}

#[tokio::test]
async fn test_sync_stops_at_limit() {
    let h = Harness::new(history(150));

    let report = h.service.sync().await.unwrap();
    assert_eq!((report.seen, report.created), (100, 100));

    let listed = h.service.list(true, 500).await.unwrap();
    assert_eq!(listed.len(), 100);
    assert_eq!(listed[0].commit_id, history(1)[0].id);
}

#[tokio::test]
async fn test_sync_auto_ignores_automation_commits() {
    let h = Harness::new(vec![
        commit("abc1234", "azuresdkci"),
        commit("def5678", "Jane Doe"),
    ]);
    h.service.sync().await.unwrap();

    assert!(h.service.get("abc1234").await.unwrap().ignored);
    assert!(!h.service.get("def5678").await.unwrap().ignored);
}

#[tokio::test]
async fn test_apply_actions() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);
    h.service.sync().await.unwrap();

    let rebuilt = h
        .service
        .apply("abc1234", SnapshotAction::Rebuild)
        .await
        .unwrap();
    assert!(rebuilt.job_id.is_some());

    let refreshed = h
        .service
        .apply("abc1234", SnapshotAction::Refresh)
        .await
        .unwrap();
    assert_eq!(refreshed.job_id, rebuilt.job_id);

    let ignored = h
        .service
        .apply("abc1234", SnapshotAction::Ignore)
        .await
        .unwrap();
    assert!(ignored.ignored);

    let err = "purge".parse::<SnapshotAction>().unwrap_err();
    assert!(matches!(err, Error::UnknownAction(_)));
}
