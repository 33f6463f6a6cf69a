//! Completion callback authentication.

use kiln_core::{Error, JobId, RefreshTarget, Result, Snapshot};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{Context, SnapshotRefresher};

/// Verifies that a completion notification comes from the job it names,
/// using the secret stored in that job's own metadata.
pub struct CallbackAuthenticator {
    ctx: Arc<Context>,
    refresher: SnapshotRefresher,
}

impl CallbackAuthenticator {
    pub fn new(ctx: Arc<Context>, refresher: SnapshotRefresher) -> Self {
        Self { ctx, refresher }
    }

    /// Authenticate a callback for `commit_id` and refresh the snapshot.
    ///
    /// Empty form values count as absent.
    pub async fn handle_callback(
        &self,
        commit_id: &str,
        secret: Option<&str>,
        job_id: Option<&str>,
    ) -> Result<Snapshot> {
        let secret = secret
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingCredential)?;
        let job_id = job_id
            .filter(|id| !id.is_empty())
            .map(JobId::new)
            .ok_or_else(|| Error::UnknownJob("no job id given".to_string()))?;

        let cluster = self.ctx.gateways.cluster.as_ref();
        let id = &job_id;
        let job = self
            .ctx
            .retry
            .run("cluster.get_job", move || cluster.get_job(id))
            .await?
            .ok_or_else(|| Error::UnknownJob(job_id.to_string()))?;

        let metadata = job.build_metadata().map_err(|err| {
            warn!(commit = %commit_id, job_id = %job_id, error = %err, "Job carries no usable metadata");
            Error::InvalidCredential(job_id.to_string())
        })?;

        if !metadata.secret.verify(secret) {
            warn!(commit = %commit_id, job_id = %job_id, "Callback secret mismatch");
            return Err(Error::InvalidCredential(job_id.to_string()));
        }
        if metadata.source_commit != commit_id {
            warn!(
                commit = %commit_id,
                job_id = %job_id,
                job_commit = %metadata.source_commit,
                "Callback names a different commit than its job"
            );
            return Err(Error::InvalidCredential(job_id.to_string()));
        }

        info!(commit = %commit_id, job_id = %job_id, "Build completion reported");
        self.refresher
            .refresh(RefreshTarget::Commit(commit_id.to_string()))
            .await
    }
}
