//! Build job identifiers.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifier of a remote build job.
///
/// Build jobs are named `build-<commit_id>-<UTC timestamp>` so an id can be
/// traced back to its commit and two submissions for the same commit never
/// collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    const PREFIX: &'static str = "build";
    const TIMESTAMP_FORMAT: &'static str = "%Y%m%d%H%M%S";

    /// Derive the job id for a build of `commit_id` submitted at `at`.
    pub fn for_build(commit_id: &str, at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}-{}-{}",
            Self::PREFIX,
            commit_id,
            at.format(Self::TIMESTAMP_FORMAT)
        ))
    }

    /// Wrap an id reported by the cluster or read from storage.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_id_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let id = JobId::for_build("abc1234", at);
        assert_eq!(id.as_str(), "build-abc1234-20240309070501");
    }

    #[test]
    fn test_ids_differ_across_submissions() {
        let first = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        assert_ne!(
            JobId::for_build("abc1234", first),
            JobId::for_build("abc1234", second)
        );
    }
}
