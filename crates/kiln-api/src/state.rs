//! Application state.

use kiln_scheduler::SnapshotService;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SnapshotService>,
}

impl AppState {
    pub fn new(service: SnapshotService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
