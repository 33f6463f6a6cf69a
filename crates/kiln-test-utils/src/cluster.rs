//! In-memory compute cluster.

use async_trait::async_trait;
use chrono::Utc;
use kiln_core::cluster::{ComputeCluster, Job, JobState, JobSubmission, Pool, Task, TaskState};
use kiln_core::{Error, JobId, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct ClusterState {
    pools: Vec<(Pool, String)>,
    jobs: HashMap<JobId, Job>,
    tasks: HashMap<(JobId, String), Task>,
    submissions: Vec<JobSubmission>,
    get_job_failures: VecDeque<Error>,
}

/// Compute cluster that records submissions and lets tests drive job and
/// task state by hand.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: Mutex<ClusterState>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool tagged with `usage`.
    pub fn with_pool(self, id: &str, usage: &str) -> Self {
        self.state.lock().unwrap().pools.push((
            Pool {
                id: id.to_string(),
            },
            usage.to_string(),
        ));
        self
    }

    pub fn set_job_state(&self, id: &JobId, state: JobState) {
        if let Some(job) = self.state.lock().unwrap().jobs.get_mut(id) {
            job.state = state;
        }
    }

    /// Drop a job as if the cluster had purged it.
    pub fn remove_job(&self, id: &JobId) {
        let mut state = self.state.lock().unwrap();
        state.jobs.remove(id);
        state.tasks.retain(|(job_id, _), _| job_id != id);
    }

    pub fn set_task_state(&self, job_id: &JobId, task_id: &str, task_state: TaskState) {
        let mut state = self.state.lock().unwrap();
        state.tasks.insert(
            (job_id.clone(), task_id.to_string()),
            Task {
                id: task_id.to_string(),
                state: task_state,
            },
        );
    }

    /// Make the next `get_job` call fail with `err`.
    pub fn fail_next_get_job(&self, err: Error) {
        self.state.lock().unwrap().get_job_failures.push_back(err);
    }

    /// Every job submitted so far, oldest first.
    pub fn submissions(&self) -> Vec<JobSubmission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn job(&self, id: &JobId) -> Option<Job> {
        self.state.lock().unwrap().jobs.get(id).cloned()
    }
}

#[async_trait]
impl ComputeCluster for MemoryCluster {
    async fn find_pool(&self, usage: &str) -> Result<Option<Pool>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .pools
            .iter()
            .find(|(_, u)| u == usage)
            .map(|(pool, _)| pool.clone()))
    }

    async fn create_job(&self, submission: JobSubmission) -> Result<Job> {
        let mut state = self.state.lock().unwrap();
        if state.jobs.contains_key(&submission.id) {
            return Err(Error::Conflict(format!("job {} exists", submission.id)));
        }

        let job = Job {
            id: submission.id.clone(),
            state: JobState::Active,
            creation_time: Utc::now(),
            metadata: submission.metadata.to_items(),
        };
        for task in &submission.tasks {
            state.tasks.insert(
                (submission.id.clone(), task.id.clone()),
                Task {
                    id: task.id.clone(),
                    state: TaskState::Pending,
                },
            );
        }
        state.jobs.insert(job.id.clone(), job.clone());
        state.submissions.push(submission);
        Ok(job)
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.get_job_failures.pop_front() {
            return Err(err);
        }
        Ok(state.jobs.get(id).cloned())
    }

    async fn get_task(&self, job_id: &JobId, task_id: &str) -> Result<Option<Task>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tasks
            .get(&(job_id.clone(), task_id.to_string()))
            .cloned())
    }
}
