//! Completion callback authentication.

mod common;

use chrono::Duration;
use common::Harness;
use kiln_core::cluster::{BUILD_TASK_ID, TaskState};
use kiln_core::{Error, JobId};
use kiln_test_utils::commit;

/// Rebuild `commit_id` and return the job id and secret the report task
/// would post.
async fn submitted(h: &Harness, commit_id: &str) -> (JobId, String) {
    let snapshot = h.service.rebuild(commit_id).await.unwrap();
    let job_id = snapshot.job_id.unwrap();
    let submission = h
        .cluster
        .submissions()
        .into_iter()
        .find(|s| s.id == job_id)
        .unwrap();
    (job_id, submission.metadata.secret.expose().to_string())
}

fn mutate_one_byte(secret: &str) -> String {
    let mut bytes = secret.as_bytes().to_vec();
    bytes[5] = if bytes[5] == b'A' { b'B' } else { b'A' };
    String::from_utf8(bytes).unwrap()
}

#[tokio::test]
async fn test_valid_callback_refreshes_snapshot() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);
    let (job_id, secret) = submitted(&h, "abc1234").await;
    h.cluster
        .set_task_state(&job_id, BUILD_TASK_ID, TaskState::Succeeded);
    h.store.put("builds", "product-abc1234.tar");

    let snapshot = h
        .service
        .handle_callback("abc1234", Some(&secret), Some(job_id.as_str()))
        .await
        .unwrap();

    assert_eq!(snapshot.task_state, Some(TaskState::Succeeded));
    assert!(snapshot.artifact_url.is_some());
    assert_eq!(h.service.get("abc1234").await.unwrap(), snapshot);
}

#[tokio::test]
async fn test_callback_after_failed_build_succeeds() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);
    let (job_id, secret) = submitted(&h, "abc1234").await;
    h.cluster
        .set_task_state(&job_id, BUILD_TASK_ID, TaskState::Failed);

    let snapshot = h
        .service
        .handle_callback("abc1234", Some(&secret), Some(job_id.as_str()))
        .await
        .unwrap();

    assert_eq!(snapshot.task_state, Some(TaskState::Failed));
    assert!(snapshot.artifact_url.is_none());
}

#[tokio::test]
async fn test_single_mutated_byte_is_rejected() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);
    let (job_id, secret) = submitted(&h, "abc1234").await;
    let before = h.service.get("abc1234").await.unwrap();
    h.cluster
        .set_task_state(&job_id, BUILD_TASK_ID, TaskState::Succeeded);
    h.store.put("builds", "product-abc1234.tar");
    h.clock.advance(Duration::minutes(10));

    let err = h
        .service
        .handle_callback(
            "abc1234",
            Some(&mutate_one_byte(&secret)),
            Some(job_id.as_str()),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidCredential(_)));
    let after = h.service.get("abc1234").await.unwrap();
    assert_eq!(after.job_last_checked_at, before.job_last_checked_at);
    assert_eq!(after.task_state, None);
    assert!(after.artifact_url.is_none());
}

#[tokio::test]
async fn test_missing_secret() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);
    let (job_id, _) = submitted(&h, "abc1234").await;

    for secret in [None, Some("")] {
        let err = h
            .service
            .handle_callback("abc1234", secret, Some(job_id.as_str()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredential));
    }
}

#[tokio::test]
async fn test_unknown_job() {
    let h = Harness::new(vec![commit("abc1234", "Jane Doe")]);
    let (_, secret) = submitted(&h, "abc1234").await;

    let err = h
        .service
        .handle_callback("abc1234", Some(&secret), Some("build-abc1234-19990101000000"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownJob(_)));

    let err = h
        .service
        .handle_callback("abc1234", Some(&secret), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownJob(_)));
}

#[tokio::test]
async fn test_job_of_other_commit_is_rejected() {
    let h = Harness::new(vec![
        commit("abc1234", "Jane Doe"),
        commit("def5678", "Jane Doe"),
    ]);
    let (job_id, secret) = submitted(&h, "abc1234").await;
    h.service.rebuild("def5678").await.unwrap();

    let err = h
        .service
        .handle_callback("def5678", Some(&secret), Some(job_id.as_str()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCredential(_)));
}
