//! Turning commit metadata into registry records.

use kiln_core::{CommitInfo, Result, Snapshot};
use tracing::info;

use crate::Context;

/// Record `commit` unless it is already known. Existing records are
/// returned untouched, so descriptive fields are only ever written once.
pub async fn ingest(ctx: &Context, commit: &CommitInfo) -> Result<(Snapshot, bool)> {
    let candidate = Snapshot::from_commit(commit, &ctx.settings.automation_author);
    let (snapshot, created) = ctx.gateways.registry.insert_if_absent(&candidate).await?;
    if created {
        info!(
            commit = %snapshot.commit_id,
            author = %snapshot.author,
            ignored = snapshot.ignored,
            "Ingested snapshot"
        );
    }
    Ok((snapshot, created))
}

/// Fetch the snapshot for `commit_id`, asking the source feed about
/// commits the registry has not seen yet.
pub async fn resolve(ctx: &Context, commit_id: &str) -> Result<Snapshot> {
    if let Some(snapshot) = ctx.gateways.registry.get(commit_id).await? {
        return Ok(snapshot);
    }

    let source = ctx.gateways.source.as_ref();
    let commit = ctx
        .retry
        .run("source.commit", move || source.commit(commit_id))
        .await?;
    let (snapshot, _) = ingest(ctx, &commit).await?;
    Ok(snapshot)
}

/// Head commit of the tracked branch.
pub async fn latest_commit(ctx: &Context) -> Result<CommitInfo> {
    let source = ctx.gateways.source.as_ref();
    ctx.retry
        .run("source.latest_commit", move || source.latest_commit())
        .await
}
