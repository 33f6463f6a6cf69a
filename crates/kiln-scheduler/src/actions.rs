//! Operator actions and the service facade the API drives.

use kiln_core::{Error, RefreshTarget, Result, Snapshot};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::{
    CallbackAuthenticator, Context, Gateways, JobScheduler, RetryPolicy, Settings,
    SnapshotRefresher, SnapshotSync, SyncReport,
};

/// What an operator can ask of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotAction {
    Refresh,
    Rebuild,
    Ignore,
}

impl FromStr for SnapshotAction {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "refresh" => Ok(SnapshotAction::Refresh),
            "rebuild" => Ok(SnapshotAction::Rebuild),
            "ignore" => Ok(SnapshotAction::Ignore),
            other => Err(Error::UnknownAction(other.to_string())),
        }
    }
}

/// All snapshot operations over one shared [`Context`].
pub struct SnapshotService {
    ctx: Arc<Context>,
    scheduler: JobScheduler,
    refresher: SnapshotRefresher,
    callbacks: CallbackAuthenticator,
    sync: SnapshotSync,
}

impl SnapshotService {
    pub fn new(gateways: Gateways, settings: Settings, retry: RetryPolicy) -> Self {
        let ctx = Context::new(gateways, settings, retry);
        let refresher = SnapshotRefresher::new(ctx.clone());
        Self {
            scheduler: JobScheduler::new(ctx.clone()),
            callbacks: CallbackAuthenticator::new(ctx.clone(), refresher.clone()),
            sync: SnapshotSync::new(ctx.clone()),
            refresher,
            ctx,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.ctx.settings
    }

    pub async fn get(&self, commit_id: &str) -> Result<Snapshot> {
        Ok(self.ctx.gateways.registry.get_required(commit_id).await?)
    }

    /// Newest first; ignored snapshots only when `include_ignored`.
    pub async fn list(&self, include_ignored: bool, limit: usize) -> Result<Vec<Snapshot>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(self.ctx.gateways.registry.list(include_ignored, limit).await?)
    }

    pub async fn rebuild(&self, commit_id: &str) -> Result<Snapshot> {
        let (snapshot, _job) = self.scheduler.rebuild(commit_id).await?;
        Ok(snapshot)
    }

    pub async fn refresh(&self, target: RefreshTarget) -> Result<Snapshot> {
        self.refresher.refresh(target).await
    }

    /// Exclude a snapshot from listings. Idempotent.
    pub async fn ignore(&self, commit_id: &str) -> Result<Snapshot> {
        let _guard = self.ctx.locks.lock(commit_id).await;
        let snapshot = self.ctx.gateways.registry.set_ignored(commit_id).await?;
        info!(commit = %commit_id, "Snapshot ignored");
        Ok(snapshot)
    }

    pub async fn handle_callback(
        &self,
        commit_id: &str,
        secret: Option<&str>,
        job_id: Option<&str>,
    ) -> Result<Snapshot> {
        self.callbacks
            .handle_callback(commit_id, secret, job_id)
            .await
    }

    /// Sync up to the configured number of commits.
    pub async fn sync(&self) -> Result<SyncReport> {
        self.sync.sync(self.ctx.settings.sync_limit).await
    }

    /// Run an operator action. `refresh` also accepts `latest`.
    pub async fn apply(&self, commit_id: &str, action: SnapshotAction) -> Result<Snapshot> {
        match action {
            SnapshotAction::Refresh => self.refresh(RefreshTarget::parse(commit_id)).await,
            SnapshotAction::Rebuild => self.rebuild(commit_id).await,
            SnapshotAction::Ignore => self.ignore(commit_id).await,
        }
    }

    /// Check that the registry answers.
    pub async fn ping(&self) -> Result<()> {
        Ok(self.ctx.gateways.registry.ping().await?)
    }
}
