//! Job scheduler: at most one live build job per snapshot.

use kiln_core::artifact::artifact_name;
use kiln_core::cluster::{Job, JobMetadata, JobSubmission};
use kiln_core::{CallbackSecret, Error, JobId, Result, Snapshot};
use std::sync::Arc;
use tracing::{info, warn};

use crate::tasks::{self, BuildRequest};
use crate::{Context, ingest};

pub struct JobScheduler {
    ctx: Arc<Context>,
}

impl JobScheduler {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Make sure a build job exists for `commit_id`.
    ///
    /// Returns the snapshot and its live job. A job the cluster still
    /// reports as running is reused; a finished or vanished one is replaced.
    pub async fn rebuild(&self, commit_id: &str) -> Result<(Snapshot, Job)> {
        let ctx = self.ctx.as_ref();
        let _guard = ctx.locks.lock(commit_id).await;

        let snapshot = ingest::resolve(ctx, commit_id).await?;

        if let Some(previous) = &snapshot.job_id {
            let cluster = ctx.gateways.cluster.as_ref();
            let existing = ctx
                .retry
                .run("cluster.get_job", move || cluster.get_job(previous))
                .await?;
            match existing {
                Some(job) if !job.state.is_terminal() => {
                    info!(commit = %commit_id, job_id = %job.id, "Build job still live, reusing");
                    return Ok((snapshot, job));
                }
                Some(job) => {
                    info!(commit = %commit_id, job_id = %job.id, "Previous build job finished");
                }
                None => {
                    info!(commit = %commit_id, job_id = %previous, "Previous build job no longer exists");
                }
            }
        }

        let job = self.submit(&snapshot).await?;

        let mut updated = snapshot.clone();
        updated.job_id = Some(job.id.clone());
        updated.job_created_at = Some(job.creation_time);
        updated.job_last_checked_at = Some(ctx.gateways.clock.now());
        updated.task_state = None;

        let swapped = ctx
            .gateways
            .registry
            .swap_job(&updated, snapshot.job_id.as_ref())
            .await?;
        if !swapped {
            warn!(
                commit = %commit_id,
                job_id = %job.id,
                "Snapshot job changed concurrently, submitted job left unrecorded"
            );
            return Err(Error::Conflict(format!(
                "job for snapshot {commit_id} was replaced concurrently"
            )));
        }

        info!(commit = %commit_id, job_id = %job.id, "Submitted build job");
        Ok((updated, job))
    }

    async fn submit(&self, snapshot: &Snapshot) -> Result<Job> {
        let ctx = self.ctx.as_ref();
        let settings = &ctx.settings;
        let cluster = ctx.gateways.cluster.as_ref();

        let usage = settings.pool_usage.as_str();
        let pool = ctx
            .retry
            .run("cluster.find_pool", move || cluster.find_pool(usage))
            .await?
            .ok_or_else(|| Error::PoolNotFound(settings.pool_usage.clone()))?;

        let job_id = JobId::for_build(&snapshot.commit_id, ctx.gateways.clock.now());
        let secret = CallbackSecret::generate();
        let clone_url = ctx.gateways.source.clone_url();
        let artifact = artifact_name(&settings.product, &snapshot.commit_id);
        let upload_url = ctx
            .gateways
            .store
            .upload_url(&settings.container, settings.upload_ttl)
            .await?;

        let tasks = tasks::job_tasks(
            settings,
            &BuildRequest {
                commit_id: &snapshot.commit_id,
                clone_url,
                artifact_name: &artifact,
                upload_url: &upload_url,
                job_id: &job_id,
                secret: &secret,
            },
        );

        info!(commit = %snapshot.commit_id, job_id = %job_id, pool = %pool.id, "Creating build job");
        cluster
            .create_job(JobSubmission {
                id: job_id,
                pool,
                metadata: JobMetadata {
                    usage: settings.pool_usage.clone(),
                    secret,
                    source_url: clone_url.to_string(),
                    source_commit: snapshot.commit_id.clone(),
                },
                tasks,
            })
            .await
    }
}
