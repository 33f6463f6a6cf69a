//! Build completion callback posted by the report task.

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Form, Router};
use kiln_core::{BUILD_COMPLETED_EVENT, CALLBACK_EVENT_HEADER};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::error::{ApiError, PlainError};

pub fn router() -> Router<AppState> {
    Router::new().route(&kiln_core::callback_path("{commit_id}"), post(build_completed))
}

#[derive(Debug, Default, Deserialize)]
struct CallbackForm {
    secret: Option<String>,
    job_id: Option<String>,
}

/// Authenticate the callback and refresh the snapshot.
///
/// A missing event header is accepted; any other event is rejected. A body
/// that is not a form is read as an empty one.
async fn build_completed(
    State(state): State<AppState>,
    Path(commit_id): Path<String>,
    headers: HeaderMap,
    form: Result<Form<CallbackForm>, FormRejection>,
) -> Result<String, PlainError> {
    if let Some(event) = headers.get(CALLBACK_EVENT_HEADER) {
        let event = event.to_str().unwrap_or("<non-ascii>");
        if event != BUILD_COMPLETED_EVENT {
            warn!(commit = %commit_id, event = %event, "Unsupported callback event");
            return Err(ApiError::BadRequest(format!("unsupported event '{event}'")).into());
        }
    }

    let form = form.map(|Form(form)| form).unwrap_or_else(|rejection| {
        debug!(commit = %commit_id, error = %rejection, "Callback body is not a form");
        CallbackForm::default()
    });

    info!(commit = %commit_id, job_id = ?form.job_id, "Received build callback");
    state
        .service
        .handle_callback(&commit_id, form.secret.as_deref(), form.job_id.as_deref())
        .await?;
    Ok(commit_id)
}
