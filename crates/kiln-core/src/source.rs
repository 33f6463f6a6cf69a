//! Source feed abstraction over the version-control host.

use async_trait::async_trait;

use crate::{CommitInfo, Result};

/// Opaque cursor for paging through the commit history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(pub String);

/// A page of commits, newest first.
#[derive(Debug, Clone, Default)]
pub struct CommitPage {
    pub commits: Vec<CommitInfo>,
    pub next: Option<PageCursor>,
}

/// Trait for version-control hosts that feed commits into the registry.
#[async_trait]
pub trait SourceFeed: Send + Sync {
    /// Head commit of the tracked branch.
    async fn latest_commit(&self) -> Result<CommitInfo>;

    /// Look up a commit by id. Unknown ids yield `Error::SnapshotNotFound`.
    async fn commit(&self, id: &str) -> Result<CommitInfo>;

    /// One page of the tracked branch history. `None` starts at the head.
    async fn list_commits(&self, cursor: Option<&PageCursor>) -> Result<CommitPage>;

    /// Clone URL of the tracked repository, handed to build tasks.
    fn clone_url(&self) -> &str;
}
