//! In-memory snapshot registry.

use async_trait::async_trait;
use kiln_core::{JobId, Snapshot};
use kiln_db::{DbError, DbResult, SnapshotRepo};
use std::collections::HashMap;
use std::sync::Mutex;

/// Snapshot registry backed by a `HashMap`, with the same conflict
/// semantics as the Postgres repository.
#[derive(Debug, Default)]
pub struct MemorySnapshotRepo {
    rows: Mutex<HashMap<String, Snapshot>>,
}

impl MemorySnapshotRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly, bypassing ingestion.
    pub fn seed(&self, snapshot: Snapshot) {
        self.rows
            .lock()
            .unwrap()
            .insert(snapshot.commit_id.clone(), snapshot);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotRepo for MemorySnapshotRepo {
    async fn get(&self, commit_id: &str) -> DbResult<Option<Snapshot>> {
        Ok(self.rows.lock().unwrap().get(commit_id).cloned())
    }

    async fn insert_if_absent(&self, snapshot: &Snapshot) -> DbResult<(Snapshot, bool)> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.get(&snapshot.commit_id) {
            return Ok((existing.clone(), false));
        }
        rows.insert(snapshot.commit_id.clone(), snapshot.clone());
        Ok((snapshot.clone(), true))
    }

    async fn save(&self, snapshot: &Snapshot) -> DbResult<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&snapshot.commit_id) {
            Some(row) => {
                *row = snapshot.clone();
                Ok(())
            }
            None => Err(DbError::NotFound(format!("snapshot {}", snapshot.commit_id))),
        }
    }

    async fn swap_job(&self, snapshot: &Snapshot, expected: Option<&JobId>) -> DbResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&snapshot.commit_id) else {
            return Ok(false);
        };
        if row.job_id.as_ref() != expected {
            return Ok(false);
        }
        row.job_id = snapshot.job_id.clone();
        row.job_created_at = snapshot.job_created_at;
        row.job_last_checked_at = snapshot.job_last_checked_at;
        row.task_state = snapshot.task_state;
        Ok(true)
    }

    async fn set_ignored(&self, commit_id: &str) -> DbResult<Snapshot> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(commit_id)
            .ok_or_else(|| DbError::NotFound(format!("snapshot {}", commit_id)))?;
        row.ignored = true;
        Ok(row.clone())
    }

    async fn list(&self, include_ignored: bool, limit: i64) -> DbResult<Vec<Snapshot>> {
        let rows = self.rows.lock().unwrap();
        let mut snapshots: Vec<Snapshot> = rows
            .values()
            .filter(|s| include_ignored || !s.ignored)
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| b.committed_at.cmp(&a.committed_at));
        snapshots.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(snapshots)
    }

    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}
