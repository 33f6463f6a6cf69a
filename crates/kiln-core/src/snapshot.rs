//! The snapshot model: one tracked commit and its build state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;
use crate::cluster::TaskState;

const MAX_AUTHOR_LEN: usize = 128;
const MAX_MESSAGE_LEN: usize = 1024;
const MAX_URL_LEN: usize = 1024;

/// Commit metadata as reported by the source feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub author_name: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
    pub html_url: String,
}

/// A tracked commit and what is known about its build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub commit_id: String,
    pub author: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
    pub source_url: String,
    pub ignored: bool,
    pub job_id: Option<JobId>,
    pub job_created_at: Option<DateTime<Utc>>,
    pub job_last_checked_at: Option<DateTime<Utc>>,
    pub artifact_url: Option<String>,
    pub task_state: Option<TaskState>,
}

impl Snapshot {
    /// Build a new snapshot from commit metadata.
    ///
    /// Commits authored by `automation_author` start out ignored.
    pub fn from_commit(commit: &CommitInfo, automation_author: &str) -> Self {
        let author = truncate(&commit.author_name, MAX_AUTHOR_LEN);
        let ignored = author == automation_author;
        Self {
            commit_id: commit.id.clone(),
            author,
            message: truncate(&commit.message, MAX_MESSAGE_LEN),
            committed_at: commit.committed_at,
            source_url: truncate(&commit.html_url, MAX_URL_LEN),
            ignored,
            job_id: None,
            job_created_at: None,
            job_last_checked_at: None,
            artifact_url: None,
            task_state: None,
        }
    }

    pub fn short_id(&self) -> &str {
        match self.commit_id.char_indices().nth(7) {
            Some((idx, _)) => &self.commit_id[..idx],
            None => &self.commit_id,
        }
    }

    /// First line of the commit message.
    pub fn subject(&self) -> &str {
        self.message.trim().lines().next().unwrap_or_default()
    }

    pub fn committed_on(&self) -> String {
        self.committed_at.format("%Y-%m-%d").to_string()
    }

    /// Forget the job reference, e.g. after the cluster dropped the job.
    pub fn clear_job(&mut self) {
        self.job_id = None;
        self.job_created_at = None;
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// What a refresh should resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTarget {
    /// The head of the tracked branch.
    Latest,
    /// A concrete commit id.
    Commit(String),
}

impl RefreshTarget {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "latest" | "<latest>" => RefreshTarget::Latest,
            other => RefreshTarget::Commit(other.to_string()),
        }
    }
}

impl std::fmt::Display for RefreshTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshTarget::Latest => write!(f, "<latest>"),
            RefreshTarget::Commit(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for RefreshTarget {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn commit(author: &str) -> CommitInfo {
        CommitInfo {
            id: "abc1234def5678".to_string(),
            author_name: author.to_string(),
            message: "  Fix the thing\n\nLonger body text\n".to_string(),
            committed_at: Utc.with_ymd_and_hms(2018, 2, 1, 12, 30, 0).unwrap(),
            html_url: "https://github.com/example/repo/commit/abc1234def5678".to_string(),
        }
    }

    #[test]
    fn test_automation_author_is_ignored() {
        let snapshot = Snapshot::from_commit(&commit("azuresdkci"), "azuresdkci");
        assert!(snapshot.ignored);
    }

    #[test]
    fn test_human_author_is_not_ignored() {
        let snapshot = Snapshot::from_commit(&commit("Jane Doe"), "azuresdkci");
        assert!(!snapshot.ignored);
        assert!(snapshot.job_id.is_none());
        assert!(snapshot.artifact_url.is_none());
    }

    #[test]
    fn test_derived_views() {
        let snapshot = Snapshot::from_commit(&commit("Jane Doe"), "azuresdkci");
        assert_eq!(snapshot.short_id(), "abc1234");
        assert_eq!(snapshot.subject(), "Fix the thing");
        assert_eq!(snapshot.committed_on(), "2018-02-01");
    }

    #[test]
    fn test_long_fields_are_truncated() {
        let mut info = commit(&"x".repeat(300));
        info.message = "m".repeat(5000);
        let snapshot = Snapshot::from_commit(&info, "azuresdkci");
        assert_eq!(snapshot.author.len(), 128);
        assert_eq!(snapshot.message.len(), 1024);
    }

    #[test]
    fn test_refresh_target_parse() {
        assert_eq!(RefreshTarget::parse("<latest>"), RefreshTarget::Latest);
        assert_eq!(RefreshTarget::parse("latest"), RefreshTarget::Latest);
        assert_eq!(
            RefreshTarget::parse("abc1234"),
            RefreshTarget::Commit("abc1234".to_string())
        );
    }
}
