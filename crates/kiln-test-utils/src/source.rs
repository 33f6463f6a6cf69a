//! In-memory commit feed.

use async_trait::async_trait;
use kiln_core::source::{CommitPage, PageCursor, SourceFeed};
use kiln_core::{CommitInfo, Error, Result};
use std::sync::Mutex;

/// Commit feed over a fixed history, newest first, paged by index.
#[derive(Debug)]
pub struct MemorySourceFeed {
    commits: Mutex<Vec<CommitInfo>>,
    page_size: usize,
    clone_url: String,
}

impl MemorySourceFeed {
    pub fn new(commits: Vec<CommitInfo>) -> Self {
        Self {
            commits: Mutex::new(commits),
            page_size: 30,
            clone_url: "https://github.com/example/product.git".to_string(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Land a new commit on top of the branch.
    pub fn push(&self, commit: CommitInfo) {
        self.commits.lock().unwrap().insert(0, commit);
    }
}

#[async_trait]
impl SourceFeed for MemorySourceFeed {
    async fn latest_commit(&self) -> Result<CommitInfo> {
        self.commits
            .lock()
            .unwrap()
            .first()
            .cloned()
            .ok_or_else(|| Error::SnapshotNotFound("branch has no commits".to_string()))
    }

    async fn commit(&self, id: &str) -> Result<CommitInfo> {
        self.commits
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::SnapshotNotFound(format!("commit {id}")))
    }

    async fn list_commits(&self, cursor: Option<&PageCursor>) -> Result<CommitPage> {
        let start = match cursor {
            Some(PageCursor(raw)) => raw
                .parse::<usize>()
                .map_err(|_| Error::InvalidInput(format!("bad cursor {raw}")))?,
            None => 0,
        };
        let commits = self.commits.lock().unwrap();
        let end = (start + self.page_size).min(commits.len());
        let page = commits.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let next = (end < commits.len()).then(|| PageCursor(end.to_string()));
        Ok(CommitPage {
            commits: page,
            next,
        })
    }

    fn clone_url(&self) -> &str {
        &self.clone_url
    }
}
