//! API routes.

pub mod callback;
pub mod health;
pub mod snapshots;
pub mod sync;

use crate::AppState;
use axum::Router;

/// Build the main router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(snapshots::router())
        .merge(callback::router())
        .merge(sync::router())
        .merge(health::router())
        .with_state(state)
}
