//! Compute cluster gateway: pools, jobs and tasks.
//!
//! A build job runs on a pool of the shared cluster and contains two tasks,
//! `build` and `report`. The cluster owns job execution; Kiln only submits
//! jobs and reads their state back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CallbackSecret, Error, JobId, Result};

/// Task that compiles and archives the commit.
pub const BUILD_TASK_ID: &str = "build";
/// Task that calls back into Kiln once the build task finished.
pub const REPORT_TASK_ID: &str = "report";

/// Lifecycle of a job as far as scheduling decisions are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepting or running tasks.
    Active,
    /// All tasks finished; no further progress.
    Completed,
    /// The backend reported a state Kiln does not model.
    Unknown,
}

impl JobState {
    /// Unknown states count as live so a job is never duplicated on a guess.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed)
    }
}

/// Observed state of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskState::Pending),
            "running" => Ok(TaskState::Running),
            "succeeded" => Ok(TaskState::Succeeded),
            "failed" => Ok(TaskState::Failed),
            "unknown" => Ok(TaskState::Unknown),
            _ => Err(format!("Unknown task state: {}", s)),
        }
    }
}

/// A pool of compute nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
}

/// A name/value pair as stored on the cluster side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub name: String,
    pub value: String,
}

impl MetadataItem {
    fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Metadata Kiln attaches to every build job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMetadata {
    /// Logical usage tag; matches the pool selection tag.
    pub usage: String,
    /// Credential the completion callback must present.
    pub secret: CallbackSecret,
    pub source_url: String,
    pub source_commit: String,
}

impl JobMetadata {
    const USAGE: &'static str = "usage";
    const SECRET: &'static str = "secret";
    const SOURCE_URL: &'static str = "source_url";
    const SOURCE_COMMIT: &'static str = "source_commit";

    pub fn to_items(&self) -> Vec<MetadataItem> {
        vec![
            MetadataItem::new(Self::USAGE, &self.usage),
            MetadataItem::new(Self::SECRET, self.secret.expose()),
            MetadataItem::new(Self::SOURCE_URL, &self.source_url),
            MetadataItem::new(Self::SOURCE_COMMIT, &self.source_commit),
        ]
    }

    pub fn from_items(items: &[MetadataItem]) -> Result<Self> {
        let lookup = |name: &str| {
            items
                .iter()
                .find(|item| item.name == name)
                .map(|item| item.value.clone())
                .ok_or_else(|| Error::InvalidInput(format!("job metadata is missing '{name}'")))
        };

        Ok(Self {
            usage: lookup(Self::USAGE)?,
            secret: CallbackSecret::from_stored(lookup(Self::SECRET)?),
            source_url: lookup(Self::SOURCE_URL)?,
            source_commit: lookup(Self::SOURCE_COMMIT)?,
        })
    }
}

/// A job as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub creation_time: DateTime<Utc>,
    pub metadata: Vec<MetadataItem>,
}

impl Job {
    pub fn build_metadata(&self) -> Result<JobMetadata> {
        JobMetadata::from_items(&self.metadata)
    }
}

/// A task as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub state: TaskState,
}

/// Uploads files matching `file_pattern` into a storage container once the
/// task has succeeded. A failed task uploads nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFileRule {
    pub file_pattern: String,
    /// Write-capable container URL.
    pub container_url: String,
    /// Blob name within the container.
    pub path: String,
}

/// Specification for one task of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: String,
    pub command_line: String,
    /// Tasks that must finish before this one starts.
    pub depends_on: Vec<String>,
    pub output_files: Vec<OutputFileRule>,
    /// Let dependent tasks start even when this task fails.
    pub satisfy_dependents_on_failure: bool,
}

/// Everything needed to create a job.
#[derive(Debug, Clone)]
pub struct JobSubmission {
    pub id: JobId,
    pub pool: Pool,
    pub metadata: JobMetadata,
    pub tasks: Vec<TaskSpec>,
}

/// Trait for compute clusters that run build jobs.
#[async_trait]
pub trait ComputeCluster: Send + Sync {
    /// Find the pool tagged for `usage`.
    async fn find_pool(&self, usage: &str) -> Result<Option<Pool>>;

    /// Create a job together with its tasks.
    async fn create_job(&self, submission: JobSubmission) -> Result<Job>;

    /// Look up a job. `None` when the cluster has no record of it.
    async fn get_job(&self, id: &JobId) -> Result<Option<Job>>;

    /// Look up a task. `None` when the task is not (yet) known.
    async fn get_task(&self, job_id: &JobId, task_id: &str) -> Result<Option<Task>>;
}
