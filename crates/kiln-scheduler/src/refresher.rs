//! Snapshot refresher: reconcile a record with the cluster and the store.

use kiln_core::artifact::ArtifactLocation;
use kiln_core::cluster::BUILD_TASK_ID;
use kiln_core::{JobId, RefreshTarget, Result, Snapshot};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{Context, ingest};

#[derive(Clone)]
pub struct SnapshotRefresher {
    ctx: Arc<Context>,
}

impl SnapshotRefresher {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Bring the snapshot for `target` up to date and persist it.
    ///
    /// A job the cluster no longer knows is forgotten. The artifact URL is
    /// re-signed whenever the blob exists and left as is otherwise.
    pub async fn refresh(&self, target: RefreshTarget) -> Result<Snapshot> {
        let ctx = self.ctx.as_ref();

        let (_guard, mut snapshot) = match target {
            RefreshTarget::Latest => {
                let head = ingest::latest_commit(ctx).await?;
                let guard = ctx.locks.lock(&head.id).await;
                let (snapshot, _) = ingest::ingest(ctx, &head).await?;
                (guard, snapshot)
            }
            RefreshTarget::Commit(commit_id) => {
                let guard = ctx.locks.lock(&commit_id).await;
                (guard, ingest::resolve(ctx, &commit_id).await?)
            }
        };

        if let Some(job_id) = snapshot.job_id.clone() {
            self.reconcile_job(&mut snapshot, &job_id).await?;
        }
        self.reconcile_artifact(&mut snapshot).await?;

        ctx.gateways.registry.save(&snapshot).await?;
        Ok(snapshot)
    }

    async fn reconcile_job(&self, snapshot: &mut Snapshot, job_id: &JobId) -> Result<()> {
        let ctx = self.ctx.as_ref();
        let cluster = ctx.gateways.cluster.as_ref();
        snapshot.job_last_checked_at = Some(ctx.gateways.clock.now());

        let job = ctx
            .retry
            .run("cluster.get_job", move || cluster.get_job(job_id))
            .await?;
        let Some(job) = job else {
            info!(commit = %snapshot.commit_id, job_id = %job_id, "Build job gone, clearing");
            snapshot.clear_job();
            return Ok(());
        };

        snapshot.job_created_at = Some(job.creation_time);
        let task = ctx
            .retry
            .run("cluster.get_task", move || {
                cluster.get_task(job_id, BUILD_TASK_ID)
            })
            .await?;
        if let Some(task) = task {
            debug!(commit = %snapshot.commit_id, job_id = %job_id, state = %task.state, "Build task state");
            snapshot.task_state = Some(task.state);
        }
        Ok(())
    }

    async fn reconcile_artifact(&self, snapshot: &mut Snapshot) -> Result<()> {
        let ctx = self.ctx.as_ref();
        let settings = &ctx.settings;
        let store = ctx.gateways.store.as_ref();
        let location =
            ArtifactLocation::for_commit(&settings.container, &settings.product, &snapshot.commit_id);

        let (container, blob) = (location.container.as_str(), location.blob.as_str());
        let exists = ctx
            .retry
            .run("store.exists", move || store.exists(container, blob))
            .await?;
        if exists {
            let url = store.signed_url(container, blob, settings.download_ttl).await?;
            if snapshot.artifact_url.is_none() {
                info!(commit = %snapshot.commit_id, blob = %blob, "Artifact available");
            }
            snapshot.artifact_url = Some(url);
        }
        Ok(())
    }
}
