//! Commit sync endpoint.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use kiln_scheduler::SyncReport;

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/sync/snapshots", post(sync_snapshots))
}

async fn sync_snapshots(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
    Ok(Json(state.service.sync().await?))
}
