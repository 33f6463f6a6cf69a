//! Snapshot repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kiln_core::cluster::TaskState;
use kiln_core::{JobId, Snapshot};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;

use crate::{DbError, DbResult};

/// A snapshot row in the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SnapshotRecord {
    pub commit_id: String,
    pub author: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
    pub source_url: String,
    pub ignored: bool,
    pub job_id: Option<String>,
    pub job_created_at: Option<DateTime<Utc>>,
    pub job_last_checked_at: Option<DateTime<Utc>>,
    pub artifact_url: Option<String>,
    pub task_state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SnapshotRecord> for Snapshot {
    fn from(record: SnapshotRecord) -> Self {
        let task_state = record.task_state.map(|raw| {
            raw.parse::<TaskState>().unwrap_or_else(|_| {
                warn!(commit = %record.commit_id, state = %raw, "Unrecognized stored task state");
                TaskState::Unknown
            })
        });

        Snapshot {
            commit_id: record.commit_id,
            author: record.author,
            message: record.message,
            committed_at: record.committed_at,
            source_url: record.source_url,
            ignored: record.ignored,
            job_id: record.job_id.map(JobId::from),
            job_created_at: record.job_created_at,
            job_last_checked_at: record.job_last_checked_at,
            artifact_url: record.artifact_url,
            task_state,
        }
    }
}

#[async_trait]
pub trait SnapshotRepo: Send + Sync {
    async fn get(&self, commit_id: &str) -> DbResult<Option<Snapshot>>;

    /// Insert `snapshot` unless its commit is already tracked.
    ///
    /// Returns the stored record and whether it was created by this call.
    /// An existing record is returned unchanged.
    async fn insert_if_absent(&self, snapshot: &Snapshot) -> DbResult<(Snapshot, bool)>;

    /// Overwrite the full record.
    async fn save(&self, snapshot: &Snapshot) -> DbResult<()>;

    /// Write the job fields of `snapshot` only if the stored `job_id` still
    /// equals `expected`. Returns `false` when another writer got there first.
    async fn swap_job(&self, snapshot: &Snapshot, expected: Option<&JobId>) -> DbResult<bool>;

    async fn set_ignored(&self, commit_id: &str) -> DbResult<Snapshot>;

    /// Newest commits first.
    async fn list(&self, include_ignored: bool, limit: i64) -> DbResult<Vec<Snapshot>>;

    async fn ping(&self) -> DbResult<()>;

    async fn get_required(&self, commit_id: &str) -> DbResult<Snapshot> {
        self.get(commit_id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("snapshot {}", commit_id)))
    }
}

/// PostgreSQL implementation of SnapshotRepo.
pub struct PgSnapshotRepo {
    pool: PgPool,
}

impl PgSnapshotRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotRepo for PgSnapshotRepo {
    async fn get(&self, commit_id: &str) -> DbResult<Option<Snapshot>> {
        let record =
            sqlx::query_as::<_, SnapshotRecord>("SELECT * FROM snapshots WHERE commit_id = $1")
                .bind(commit_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record.map(Snapshot::from))
    }

    async fn insert_if_absent(&self, snapshot: &Snapshot) -> DbResult<(Snapshot, bool)> {
        let inserted = sqlx::query_as::<_, SnapshotRecord>(
            r#"
            INSERT INTO snapshots (commit_id, author, message, committed_at, source_url, ignored, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            ON CONFLICT (commit_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&snapshot.commit_id)
        .bind(&snapshot.author)
        .bind(&snapshot.message)
        .bind(snapshot.committed_at)
        .bind(&snapshot.source_url)
        .bind(snapshot.ignored)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(record) => Ok((record.into(), true)),
            None => Ok((self.get_required(&snapshot.commit_id).await?, false)),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE snapshots
            SET author = $2, message = $3, committed_at = $4, source_url = $5, ignored = $6,
                job_id = $7, job_created_at = $8, job_last_checked_at = $9,
                artifact_url = $10, task_state = $11, updated_at = NOW()
            WHERE commit_id = $1
            "#,
        )
        .bind(&snapshot.commit_id)
        .bind(&snapshot.author)
        .bind(&snapshot.message)
        .bind(snapshot.committed_at)
        .bind(&snapshot.source_url)
        .bind(snapshot.ignored)
        .bind(snapshot.job_id.as_ref().map(JobId::as_str))
        .bind(snapshot.job_created_at)
        .bind(snapshot.job_last_checked_at)
        .bind(&snapshot.artifact_url)
        .bind(snapshot.task_state.map(|s| s.as_str()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("snapshot {}", snapshot.commit_id)));
        }
        Ok(())
    }

    async fn swap_job(&self, snapshot: &Snapshot, expected: Option<&JobId>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE snapshots
            SET job_id = $2, job_created_at = $3, job_last_checked_at = $4, task_state = $5,
                updated_at = NOW()
            WHERE commit_id = $1 AND job_id IS NOT DISTINCT FROM $6
            "#,
        )
        .bind(&snapshot.commit_id)
        .bind(snapshot.job_id.as_ref().map(JobId::as_str))
        .bind(snapshot.job_created_at)
        .bind(snapshot.job_last_checked_at)
        .bind(snapshot.task_state.map(|s| s.as_str()))
        .bind(expected.map(JobId::as_str))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_ignored(&self, commit_id: &str) -> DbResult<Snapshot> {
        let record = sqlx::query_as::<_, SnapshotRecord>(
            r#"
            UPDATE snapshots SET ignored = TRUE, updated_at = NOW()
            WHERE commit_id = $1
            RETURNING *
            "#,
        )
        .bind(commit_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("snapshot {}", commit_id)))?;
        Ok(record.into())
    }

    async fn list(&self, include_ignored: bool, limit: i64) -> DbResult<Vec<Snapshot>> {
        let records = sqlx::query_as::<_, SnapshotRecord>(
            r#"
            SELECT * FROM snapshots
            WHERE $1 OR NOT ignored
            ORDER BY committed_at DESC
            LIMIT $2
            "#,
        )
        .bind(include_ignored)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(Snapshot::from).collect())
    }

    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
