//! Per-commit keyed locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes read-decide-write sequences on the same commit within this
/// process.
///
/// Entries are weak so the table only holds commits someone is currently
/// working on; dead entries are pruned whenever a lock is taken.
#[derive(Debug, Default)]
pub struct CommitLocks {
    entries: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl CommitLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `commit_id`. Released when the guard drops.
    pub async fn lock(&self, commit_id: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.retain(|_, entry| entry.strong_count() > 0);
            match entries.get(commit_id).and_then(Weak::upgrade) {
                Some(mutex) => mutex,
                None => {
                    let mutex = Arc::new(AsyncMutex::new(()));
                    entries.insert(commit_id.to_string(), Arc::downgrade(&mutex));
                    mutex
                }
            }
        };
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_commit_is_serialized() {
        let locks = Arc::new(CommitLocks::new());
        let guard = locks.lock("abc1234").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("abc1234").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_commits_do_not_block() {
        let locks = CommitLocks::new();
        let _a = locks.lock("aaa").await;
        let _b = locks.lock("bbb").await;
        assert_eq!(locks.entries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = CommitLocks::new();
        drop(locks.lock("aaa").await);
        let _b = locks.lock("bbb").await;
        let entries = locks.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("bbb"));
    }
}
