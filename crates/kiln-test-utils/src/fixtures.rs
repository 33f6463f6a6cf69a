//! Factory functions for test data.

use chrono::{Duration, TimeZone, Utc};
use kiln_core::CommitInfo;

/// Commit metadata for `id` by `author`.
pub fn commit(id: &str, author: &str) -> CommitInfo {
    CommitInfo {
        id: id.to_string(),
        author_name: author.to_string(),
        message: format!("Change {id}\n\nDetails for {id}"),
        committed_at: Utc.with_ymd_and_hms(2018, 2, 1, 12, 0, 0).unwrap(),
        html_url: format!("https://github.com/example/product/commit/{id}"),
    }
}

/// `count` commits, newest first, one hour apart.
pub fn history(count: usize) -> Vec<CommitInfo> {
    (0..count)
        .map(|i| {
            let mut info = commit(&format!("{:07x}", 0xc0ffee - i), "Jane Doe");
            info.committed_at -= Duration::hours(i as i64);
            info
        })
        .collect()
}
