//! Snapshot listing and operator actions.

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{DateTime, Utc};
use kiln_core::Snapshot;
use kiln_core::cluster::TaskState;
use kiln_scheduler::SnapshotAction;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::AppState;
use crate::error::ApiError;

const DEFAULT_LIST_LIMIT: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/snapshots", get(list_snapshots))
        .route("/api/snapshots/{commit_id}", get(get_snapshot))
        .route("/snapshots/{commit_id}", post(update_snapshot))
}

/// A snapshot with its derived views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub commit_id: String,
    pub short_id: String,
    pub subject: String,
    pub author: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
    pub committed_on: String,
    pub source_url: String,
    pub ignored: bool,
    pub job_id: Option<String>,
    pub job_created_at: Option<DateTime<Utc>>,
    pub job_last_checked_at: Option<DateTime<Utc>>,
    pub artifact_url: Option<String>,
    pub task_state: Option<TaskState>,
}

impl From<Snapshot> for SnapshotResponse {
    fn from(s: Snapshot) -> Self {
        Self {
            short_id: s.short_id().to_string(),
            subject: s.subject().to_string(),
            committed_on: s.committed_on(),
            job_id: s.job_id.map(|id| id.into_inner()),
            commit_id: s.commit_id,
            author: s.author,
            message: s.message,
            committed_at: s.committed_at,
            source_url: s.source_url,
            ignored: s.ignored,
            job_created_at: s.job_created_at,
            job_last_checked_at: s.job_last_checked_at,
            artifact_url: s.artifact_url,
            task_state: s.task_state,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    all: bool,
    limit: Option<usize>,
}

async fn list_snapshots(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SnapshotResponse>>, ApiError> {
    let snapshots = state
        .service
        .list(query.all, query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(snapshots.into_iter().map(Into::into).collect()))
}

async fn get_snapshot(
    State(state): State<AppState>,
    Path(commit_id): Path<String>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let snapshot = state.service.get(&commit_id).await?;
    Ok(Json(snapshot.into()))
}

#[derive(Debug, Default, Deserialize)]
struct ActionForm {
    #[serde(default)]
    action: String,
}

async fn update_snapshot(
    State(state): State<AppState>,
    Path(commit_id): Path<String>,
    form: Result<Form<ActionForm>, FormRejection>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let form = form.map(|Form(form)| form).unwrap_or_else(|rejection| {
        debug!(commit = %commit_id, error = %rejection, "Action body is not a form");
        ActionForm::default()
    });
    let action: SnapshotAction = form.action.parse()?;
    info!(commit = %commit_id, ?action, "Operator action");
    let snapshot = state.service.apply(&commit_id, action).await?;
    Ok(Json(snapshot.into()))
}
