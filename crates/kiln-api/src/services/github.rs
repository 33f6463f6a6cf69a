//! GitHub commit feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kiln_core::source::{CommitPage, PageCursor, SourceFeed};
use kiln_core::{CommitInfo, Error, Result};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// GitHub feed configuration.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token: Option<String>,
    pub page_size: u32,
    pub clone_url: String,
    pub timeout: Duration,
}

impl GitHubConfig {
    pub fn from_config(source: &kiln_config::SourceConfig, timeout: Duration) -> Result<Self> {
        let (owner, repo) = source
            .owner_and_repo()
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(Self {
            api_url: source.api_url.trim_end_matches('/').to_string(),
            owner,
            repo,
            branch: source.branch.clone(),
            token: source.token.clone(),
            page_size: source.page_size,
            clone_url: source.repository.clone(),
            timeout,
        })
    }

    fn commits_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/commits",
            self.api_url, self.owner, self.repo
        )
    }
}

/// Source feed backed by the GitHub REST API.
pub struct GitHubFeed {
    client: reqwest::Client,
    config: GitHubConfig,
}

impl GitHubFeed {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("kiln")
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn get(&self, url: &str) -> std::result::Result<reqwest::Response, GitHubError> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| GitHubError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => GitHubError::NotFound(text),
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                GitHubError::Unavailable(format!("{}: {}", s, text))
            }
            s => GitHubError::Api(format!("{}: {}", s, text)),
        })
    }

    async fn get_commit(&self, reference: &str) -> Result<CommitInfo> {
        let url = format!(
            "{}/{}",
            self.config.commits_url(),
            urlencoding::encode(reference)
        );
        let commit: GitHubCommit = self
            .get(&url)
            .await
            .map_err(|e| e.for_ref(reference))?
            .json()
            .await
            .map_err(|e| GitHubError::Parse(e.to_string()))?;
        Ok(commit.into())
    }
}

#[async_trait]
impl SourceFeed for GitHubFeed {
    async fn latest_commit(&self) -> Result<CommitInfo> {
        self.get_commit(&self.config.branch).await
    }

    async fn commit(&self, id: &str) -> Result<CommitInfo> {
        self.get_commit(id).await
    }

    async fn list_commits(&self, cursor: Option<&PageCursor>) -> Result<CommitPage> {
        let url = match cursor {
            Some(PageCursor(next)) => next.clone(),
            None => format!(
                "{}?sha={}&per_page={}",
                self.config.commits_url(),
                urlencoding::encode(&self.config.branch),
                self.config.page_size
            ),
        };
        debug!(url = %url, "Listing commits");

        let response = self.get(&url).await?;
        let next = next_link(response.headers()).map(PageCursor);
        let commits: Vec<GitHubCommit> = response
            .json()
            .await
            .map_err(|e| GitHubError::Parse(e.to_string()))?;

        Ok(CommitPage {
            commits: commits.into_iter().map(Into::into).collect(),
            next,
        })
    }

    fn clone_url(&self) -> &str {
        &self.config.clone_url
    }
}

/// Target of the `rel="next"` entry of a `Link` header.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';').map(str::trim);
        let target = parts.next()?;
        let is_next = parts.any(|p| p == r#"rel="next""#);
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: String,
    html_url: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    author: Author,
    committer: Committer,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

/// The committer date changes on rebase and cherry-pick; it orders the branch.
#[derive(Debug, Deserialize)]
struct Committer {
    date: DateTime<Utc>,
}

impl From<GitHubCommit> for CommitInfo {
    fn from(c: GitHubCommit) -> Self {
        CommitInfo {
            id: c.sha,
            author_name: c.commit.author.name,
            message: c.commit.message,
            committed_at: c.commit.committer.date,
            html_url: c.html_url,
        }
    }
}

/// GitHub API errors.
#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("GitHub unavailable: {0}")]
    Unavailable(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl GitHubError {
    fn for_ref(self, reference: &str) -> Self {
        match self {
            GitHubError::NotFound(_) => GitHubError::NotFound(format!("commit {}", reference)),
            other => other,
        }
    }
}

impl From<GitHubError> for Error {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::NotFound(msg) => Error::SnapshotNotFound(msg),
            GitHubError::Request(_) | GitHubError::Unavailable(_) => {
                Error::Upstream(err.to_string())
            }
            GitHubError::Api(_) | GitHubError::Parse(_) => Error::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/repositories/1/commits?sha=dev&page=2>; rel="next", <https://api.github.com/repositories/1/commits?sha=dev&page=9>; rel="last""#,
            ),
        );
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://api.github.com/repositories/1/commits?sha=dev&page=2")
        );
    }

    #[test]
    fn test_last_page_has_no_next() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/repositories/1/commits?page=1>; rel="first", <https://api.github.com/repositories/1/commits?page=8>; rel="prev""#,
            ),
        );
        assert_eq!(next_link(&headers), None);
        assert_eq!(next_link(&HeaderMap::new()), None);
    }

    #[test]
    fn test_commit_conversion() {
        let raw = r#"{
            "sha": "abc1234",
            "html_url": "https://github.com/example/product/commit/abc1234",
            "commit": {
                "author": { "name": "Jane Doe", "date": "2018-01-15T09:30:00Z" },
                "committer": { "name": "Build Bot", "date": "2018-02-01T12:00:00Z" },
                "message": "Fix the thing"
            }
        }"#;
        let commit: CommitInfo = serde_json::from_str::<GitHubCommit>(raw).unwrap().into();
        assert_eq!(commit.id, "abc1234");
        assert_eq!(commit.author_name, "Jane Doe");
        assert_eq!(commit.committed_at.to_rfc3339(), "2018-02-01T12:00:00+00:00");
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            Error::from(GitHubError::NotFound("commit x".into())),
            Error::SnapshotNotFound(_)
        ));
        assert!(Error::from(GitHubError::Unavailable("502".into())).is_transient());
        assert!(!Error::from(GitHubError::Parse("bad".into())).is_transient());
    }
}
