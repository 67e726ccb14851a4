use dashmap::DashMap;
use pkg_gitops::pusher::short_branch;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per `(remote, branch)`.
///
/// Holding the guard for a whole clone-commit-push transaction keeps pushes
/// from this process to the same branch from racing each other. Pushes to
/// different branches proceed in parallel.
#[derive(Clone, Default)]
pub struct BranchLocks {
    locks: Arc<DashMap<(String, String), Arc<Mutex<()>>>>,
}

impl BranchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `branch` of `remote`.
    pub async fn lock(&self, remote: &str, branch: &str) -> OwnedMutexGuard<()> {
        let key = (
            remote.trim_end_matches('/').to_string(),
            short_branch(branch).to_string(),
        );
        let lock = self.locks.entry(key).or_default().clone();
        lock.lock_owned().await
    }

    /// Number of branches seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_branch_is_exclusive() {
        let locks = BranchLocks::new();
        let guard = locks.lock("https://git.example.com/a.git", "main").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = other
                .lock("https://git.example.com/a.git/", "refs/heads/main")
                .await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_different_branches_do_not_block() {
        let locks = BranchLocks::new();
        let _main = locks.lock("https://git.example.com/a.git", "main").await;
        let _dev = tokio::time::timeout(
            Duration::from_secs(1),
            locks.lock("https://git.example.com/a.git", "dev"),
        )
        .await
        .unwrap();
        assert_eq!(locks.len(), 2);
    }
}
