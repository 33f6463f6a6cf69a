//! Error types for Kiln.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("no compute pool tagged for usage '{0}'")]
    PoolNotFound(String),

    #[error("job not found: {0}")]
    UnknownJob(String),

    #[error("missing callback secret")]
    MissingCredential,

    #[error("invalid callback secret for job {0}")]
    InvalidCredential(String),

    #[error("unknown action '{0}', expected one of: refresh, rebuild, ignore")]
    UnknownAction(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the failure is a transient upstream condition worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Upstream(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
