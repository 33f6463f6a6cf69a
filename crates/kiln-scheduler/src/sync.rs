//! Sync sweep: pull recent commits from the source feed into the registry.

use kiln_core::Result;
use kiln_core::source::PageCursor;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::{Context, ingest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Commits looked at.
    pub seen: usize,
    /// Commits that were new to the registry.
    pub created: usize,
}

pub struct SnapshotSync {
    ctx: Arc<Context>,
}

impl SnapshotSync {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Walk the branch history from its head and ingest up to `limit`
    /// commits.
    pub async fn sync(&self, limit: usize) -> Result<SyncReport> {
        let ctx = self.ctx.as_ref();
        let source = ctx.gateways.source.as_ref();
        let mut report = SyncReport::default();
        let mut cursor: Option<PageCursor> = None;

        'pages: while report.seen < limit {
            let current = cursor.take();
            let current = current.as_ref();
            let page = ctx
                .retry
                .run("source.list_commits", move || source.list_commits(current))
                .await?;
            if page.commits.is_empty() {
                break;
            }

            for commit in &page.commits {
                if report.seen >= limit {
                    break 'pages;
                }
                report.seen += 1;
                let (_, created) = ingest::ingest(ctx, commit).await?;
                if created {
                    report.created += 1;
                }
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(seen = report.seen, created = report.created, "Snapshot sync finished");
        Ok(report)
    }
}
