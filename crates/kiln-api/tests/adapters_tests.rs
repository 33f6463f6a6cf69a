//! GitHub feed and blob store against stub servers.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, head};
use axum::Json;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kiln_api::services::{AzureBlobStore, BlobStoreConfig, GitHubConfig, GitHubFeed};
use kiln_core::Error;
use kiln_core::artifact::ObjectStore;
use kiln_core::source::SourceFeed;
use kiln_test_utils::ManualClock;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

fn commit_json(sha: &str, author: &str) -> Value {
    json!({
        "sha": sha,
        "html_url": format!("https://github.com/example/product/commit/{sha}"),
        "commit": {
            "author": { "name": author, "date": "2018-01-20T08:00:00Z" },
            "committer": { "name": "GitHub", "date": "2018-02-01T12:00:00Z" },
            "message": format!("Change {sha}")
        }
    })
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<u32>,
}

async fn list_commits(
    State(base): State<String>,
    Query(query): Query<PageQuery>,
) -> impl IntoResponse {
    let page = query.page.unwrap_or(1);
    let mut headers = HeaderMap::new();
    let body = if page == 1 {
        let link = format!(r#"<{base}/repos/example/product/commits?sha=dev&page=2>; rel="next""#);
        headers.insert(header::LINK, HeaderValue::from_str(&link).unwrap());
        json!([commit_json("ccc3333", "Jane Doe"), commit_json("bbb2222", "azuresdkci")])
    } else {
        json!([commit_json("aaa1111", "Jane Doe")])
    };
    (headers, Json(body))
}

async fn get_commit(Path(reference): Path<String>) -> impl IntoResponse {
    match reference.as_str() {
        "dev" | "ccc3333" => Json(commit_json("ccc3333", "Jane Doe")).into_response(),
        "boom" => StatusCode::BAD_GATEWAY.into_response(),
        _ => (StatusCode::UNPROCESSABLE_ENTITY, "No commit found").into_response(),
    }
}

async fn serve(build: impl FnOnce(String) -> Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = build(base.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

async fn github() -> GitHubFeed {
    let base = serve(|base| {
        Router::new()
            .route("/repos/example/product/commits", get(list_commits))
            .route("/repos/example/product/commits/{reference}", get(get_commit))
            .with_state(base)
    })
    .await;

    GitHubFeed::new(GitHubConfig {
        api_url: base,
        owner: "example".to_string(),
        repo: "product".to_string(),
        branch: "dev".to_string(),
        token: Some("token".to_string()),
        page_size: 2,
        clone_url: "https://github.com/example/product.git".to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn test_github_pages_follow_link_header() {
    let feed = github().await;

    let first = feed.list_commits(None).await.unwrap();
    let ids: Vec<_> = first.commits.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["ccc3333", "bbb2222"]);
    let next = first.next.expect("first page links to the second");

    let second = feed.list_commits(Some(&next)).await.unwrap();
    assert_eq!(second.commits.len(), 1);
    assert_eq!(second.commits[0].id, "aaa1111");
    assert!(second.next.is_none());
}

#[tokio::test]
async fn test_github_commit_lookup() {
    let feed = github().await;

    let head = feed.latest_commit().await.unwrap();
    assert_eq!(head.id, "ccc3333");
    assert_eq!(head.author_name, "Jane Doe");
    assert_eq!(head.committed_at.to_rfc3339(), "2018-02-01T12:00:00+00:00");

    let err = feed.commit("fff0000").await.unwrap_err();
    assert!(matches!(err, Error::SnapshotNotFound(_)));

    let err = feed.commit("boom").await.unwrap_err();
    assert!(err.is_transient());
}

async fn blob_store() -> AzureBlobStore {
    let endpoint = serve(|_| {
        Router::new().route(
            "/builds/{blob}",
            head(|Path(blob): Path<String>| async move {
                match blob.as_str() {
                    "product-abc1234.tar" => StatusCode::OK,
                    "product-busy.tar" => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::NOT_FOUND,
                }
            }),
        )
    })
    .await;

    AzureBlobStore::new(
        BlobStoreConfig {
            account: "kilnbuilds".to_string(),
            key: STANDARD.encode(b"not-a-real-account-key"),
            endpoint,
            timeout: Duration::from_secs(5),
        },
        Arc::new(ManualClock::default()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_blob_exists() {
    let store = blob_store().await;
    assert!(store.exists("builds", "product-abc1234.tar").await.unwrap());
    assert!(!store.exists("builds", "product-def5678.tar").await.unwrap());

    let err = store.exists("builds", "product-busy.tar").await.unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
}
