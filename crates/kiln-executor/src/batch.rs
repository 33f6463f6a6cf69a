//! Batch REST API cluster implementation.
//!
//! Pools, jobs and tasks map one to one onto the Batch resources. Jobs are
//! created with task dependencies enabled and terminate themselves once all
//! tasks completed, which is what moves them into a terminal state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kiln_core::cluster::*;
use kiln_core::{Error, JobId, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for a Batch account.
#[derive(Debug, Clone)]
pub struct BatchClusterConfig {
    /// Account endpoint, e.g. `https://account.region.batch.azure.com`.
    pub endpoint: String,
    pub api_version: String,
    /// Bearer token for the account, if the endpoint requires one.
    pub token: Option<String>,
    pub timeout: Duration,
}

/// Batch-backed compute cluster.
pub struct BatchCluster {
    client: reqwest::Client,
    config: BatchClusterConfig,
}

impl BatchCluster {
    pub fn new(config: BatchClusterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("kiln")
            .build()
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            path,
            self.config.api_version
        )
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header("Accept", "application/json");
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        builder.send().await.map_err(upstream)
    }

    /// GET a resource, mapping 404 to `None`.
    async fn get_optional<T>(&self, path: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self.send(self.request(reqwest::Method::GET, path)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        response.json().await.map(Some).map_err(upstream)
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, path)
                    .header("Content-Type", "application/json; odata=minimalmetadata")
                    .json(body),
            )
            .await?;
        check_status(response).await
    }

    async fn add_tasks(&self, job_id: &JobId, tasks: &[TaskSpec]) -> Result<()> {
        let body = TaskCollection {
            value: tasks.iter().map(BatchTaskSpec::from).collect(),
        };
        let path = format!("jobs/{}/addtaskcollection", urlencoding::encode(job_id.as_str()));
        let response = self.post_json(&path, &body).await?;

        let results: TaskAddResults = response.json().await.map_err(upstream)?;
        let failed: Vec<_> = results
            .value
            .iter()
            .filter(|r| r.status != "success")
            .map(|r| format!("{} ({})", r.task_id, r.status))
            .collect();

        if !failed.is_empty() {
            return Err(Error::Internal(format!(
                "failed to add tasks to job {}: {}",
                job_id,
                failed.join(", ")
            )));
        }
        Ok(())
    }

    /// Terminate a job whose task graph could not be submitted, so it does not
    /// sit around as an empty active job.
    async fn terminate(&self, job_id: &JobId) {
        let path = format!("jobs/{}/terminate", urlencoding::encode(job_id.as_str()));
        let result = self
            .send(self.request(reqwest::Method::POST, &path).json(&serde_json::json!({})))
            .await;
        if let Err(e) = result {
            warn!(job_id = %job_id, error = %e, "Failed to terminate incomplete job");
        }
    }
}

#[async_trait]
impl ComputeCluster for BatchCluster {
    async fn find_pool(&self, usage: &str) -> Result<Option<Pool>> {
        let pools: PoolList = self
            .get_optional("pools")
            .await?
            .ok_or_else(|| Error::Upstream("pool listing returned 404".to_string()))?;

        let pool = pools.value.into_iter().find(|pool| {
            pool.metadata
                .iter()
                .any(|item| item.name == "usage" && item.value == usage)
        });

        debug!(usage = %usage, pool = ?pool.as_ref().map(|p| &p.id), "Resolved pool");
        Ok(pool.map(|p| Pool { id: p.id }))
    }

    async fn create_job(&self, submission: JobSubmission) -> Result<Job> {
        let body = BatchJobSpec {
            id: submission.id.as_str().to_string(),
            pool_info: PoolInfo {
                pool_id: submission.pool.id.clone(),
            },
            metadata: submission.metadata.to_items(),
            uses_task_dependencies: true,
            on_all_tasks_complete: "terminatejob",
        };

        self.post_json("jobs", &body).await?;
        info!(job_id = %submission.id, pool = %submission.pool.id, "Created job");

        if let Err(e) = self.add_tasks(&submission.id, &submission.tasks).await {
            self.terminate(&submission.id).await;
            return Err(e);
        }

        self.get_job(&submission.id).await?.ok_or_else(|| {
            Error::Upstream(format!("job {} vanished right after creation", submission.id))
        })
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>> {
        let path = format!("jobs/{}", urlencoding::encode(id.as_str()));
        let job: Option<BatchJob> = self.get_optional(&path).await?;
        Ok(job.map(Job::from))
    }

    async fn get_task(&self, job_id: &JobId, task_id: &str) -> Result<Option<Task>> {
        let path = format!(
            "jobs/{}/tasks/{}",
            urlencoding::encode(job_id.as_str()),
            urlencoding::encode(task_id)
        );
        let task: Option<BatchTask> = self.get_optional(&path).await?;
        Ok(task.map(Task::from))
    }
}

fn upstream(err: reqwest::Error) -> Error {
    Error::Upstream(err.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(Error::Upstream(format!("batch returned {}: {}", status, text)))
    } else {
        Err(Error::Internal(format!("batch returned {}: {}", status, text)))
    }
}

// Wire types

#[derive(Debug, Deserialize)]
struct PoolList {
    #[serde(default)]
    value: Vec<BatchPool>,
}

#[derive(Debug, Deserialize)]
struct BatchPool {
    id: String,
    #[serde(default)]
    metadata: Vec<MetadataItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PoolInfo {
    pool_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchJobSpec {
    id: String,
    pool_info: PoolInfo,
    metadata: Vec<MetadataItem>,
    uses_task_dependencies: bool,
    on_all_tasks_complete: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchJob {
    id: String,
    state: String,
    creation_time: DateTime<Utc>,
    #[serde(default)]
    metadata: Vec<MetadataItem>,
}

impl From<BatchJob> for Job {
    fn from(job: BatchJob) -> Self {
        Job {
            id: JobId::new(job.id),
            state: job_state(&job.state),
            creation_time: job.creation_time,
            metadata: job.metadata,
        }
    }
}

fn job_state(raw: &str) -> JobState {
    match raw {
        "completed" => JobState::Completed,
        "active" | "enabling" | "disabling" | "disabled" | "terminating" | "deleting" => {
            JobState::Active
        }
        _ => JobState::Unknown,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchTask {
    id: String,
    state: String,
    execution_info: Option<ExecutionInfo>,
}

#[derive(Debug, Deserialize)]
struct ExecutionInfo {
    result: Option<String>,
}

impl From<BatchTask> for Task {
    fn from(task: BatchTask) -> Self {
        let result = task.execution_info.and_then(|info| info.result);
        Task {
            id: task.id,
            state: task_state(&task.state, result.as_deref()),
        }
    }
}

fn task_state(raw: &str, result: Option<&str>) -> TaskState {
    match (raw, result) {
        ("active", _) => TaskState::Pending,
        ("preparing" | "running", _) => TaskState::Running,
        ("completed", Some("success")) => TaskState::Succeeded,
        ("completed", Some("failure")) => TaskState::Failed,
        _ => TaskState::Unknown,
    }
}

#[derive(Debug, Serialize)]
struct TaskCollection {
    value: Vec<BatchTaskSpec>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchTaskSpec {
    id: String,
    command_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    depends_on: Option<DependsOn>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    output_files: Vec<OutputFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_conditions: Option<ExitConditions>,
}

impl From<&TaskSpec> for BatchTaskSpec {
    fn from(spec: &TaskSpec) -> Self {
        BatchTaskSpec {
            id: spec.id.clone(),
            command_line: spec.command_line.clone(),
            depends_on: (!spec.depends_on.is_empty()).then(|| DependsOn {
                task_ids: spec.depends_on.clone(),
            }),
            output_files: spec.output_files.iter().map(OutputFile::from).collect(),
            exit_conditions: spec.satisfy_dependents_on_failure.then(|| ExitConditions {
                default: ExitOptions {
                    dependency_action: "satisfy",
                },
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DependsOn {
    task_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExitConditions {
    default: ExitOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExitOptions {
    dependency_action: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputFile {
    file_pattern: String,
    destination: OutputDestination,
    upload_options: UploadOptions,
}

impl From<&OutputFileRule> for OutputFile {
    fn from(rule: &OutputFileRule) -> Self {
        OutputFile {
            file_pattern: rule.file_pattern.clone(),
            destination: OutputDestination {
                container: ContainerDestination {
                    container_url: rule.container_url.clone(),
                    path: rule.path.clone(),
                },
            },
            upload_options: UploadOptions {
                upload_condition: "tasksuccess",
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputDestination {
    container: ContainerDestination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerDestination {
    container_url: String,
    path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadOptions {
    upload_condition: &'static str,
}

#[derive(Debug, Deserialize)]
struct TaskAddResults {
    #[serde(default)]
    value: Vec<TaskAddResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskAddResult {
    status: String,
    task_id: String,
}
