//! Component D: file lock manager. Backed by the `locks` bucket. The key
//! is a reversible encoding of `(repo, path)`: every `/` in `path` becomes
//! `.`, then `repo` and the mangled path are joined with `=` (§4.D).

use super::models::FileLock;
use crate::error::Result;
use crate::substrate::Substrate;
use chrono::Utc;
use std::sync::Arc;

const BUCKET: &str = "locks";

pub fn encode_key(repo: &str, path: &str) -> String {
    format!("{repo}={}", path.replace('/', "."))
}

pub struct LockManager {
    substrate: Arc<dyn Substrate>,
}

impl LockManager {
    pub fn new(substrate: Arc<dyn Substrate>) -> Self {
        Self { substrate }
    }

    /// Fails (`AlreadyExists`) if the key is already locked. Contention is
    /// the caller's to resolve — retry or abandon, not this manager's call.
    pub async fn acquire(&self, repo: &str, path: &str, agent_id: &str, task_id: &str) -> Result<()> {
        let key = encode_key(repo, path);
        let lock = FileLock {
            agent_id: agent_id.to_string(),
            task_id: task_id.to_string(),
            locked_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&lock)?;
        self.substrate.create(BUCKET, &key, bytes).await?;
        Ok(())
    }

    /// Best-effort: releasing a lock that isn't held is not an error.
    pub async fn release(&self, repo: &str, path: &str) -> Result<()> {
        let key = encode_key(repo, path);
        self.substrate.delete(BUCKET, &key).await
    }

    pub async fn get(&self, repo: &str, path: &str) -> Result<Option<FileLock>> {
        let key = encode_key(repo, path);
        match self.substrate.get(BUCKET, &key).await? {
            Some(entry) => Ok(Some(serde_json::from_slice(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Scans every lock, deletes the ones held by `agent_id`, returns how
    /// many were released. Called by the liveness monitor when it marks an
    /// agent offline (§4.F).
    pub async fn release_all_by_agent(&self, agent_id: &str) -> Result<usize> {
        let keys = self.substrate.list_keys(BUCKET).await?;
        let mut released = 0;
        for key in keys {
            let Some(entry) = self.substrate.get(BUCKET, &key).await? else {
                continue;
            };
            let lock: FileLock = serde_json::from_slice(&entry.value)?;
            if lock.agent_id == agent_id {
                self.substrate.delete(BUCKET, &key).await?;
                released += 1;
            }
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForgeError;
    use crate::substrate::embedded::EmbeddedSubstrate;

    fn manager() -> LockManager {
        LockManager::new(Arc::new(EmbeddedSubstrate::new(None).unwrap()))
    }

    #[test]
    fn encode_key_replaces_slashes_and_joins_with_equals() {
        assert_eq!(encode_key("repo1", "src/main.rs"), "repo1=src.main.rs");
    }

    #[tokio::test]
    async fn acquire_twice_fails() {
        let mgr = manager();
        mgr.acquire("repo1", "src/main.rs", "a1", "t1").await.unwrap();
        let err = mgr
            .acquire("repo1", "src/main.rs", "a2", "t2")
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn release_then_acquire_succeeds() {
        let mgr = manager();
        mgr.acquire("repo1", "src/main.rs", "a1", "t1").await.unwrap();
        mgr.release("repo1", "src/main.rs").await.unwrap();
        mgr.acquire("repo1", "src/main.rs", "a2", "t2").await.unwrap();
    }

    #[tokio::test]
    async fn release_of_unheld_lock_is_not_an_error() {
        let mgr = manager();
        mgr.release("repo1", "nope.rs").await.unwrap();
    }

    #[tokio::test]
    async fn release_all_by_agent_only_touches_its_own_locks() {
        let mgr = manager();
        mgr.acquire("repo1", "a.rs", "agent-1", "t1").await.unwrap();
        mgr.acquire("repo1", "b.rs", "agent-1", "t2").await.unwrap();
        mgr.acquire("repo1", "c.rs", "agent-2", "t3").await.unwrap();

        let released = mgr.release_all_by_agent("agent-1").await.unwrap();
        assert_eq!(released, 2);
        assert!(mgr.get("repo1", "a.rs").await.unwrap().is_none());
        assert!(mgr.get("repo1", "b.rs").await.unwrap().is_none());
        assert!(mgr.get("repo1", "c.rs").await.unwrap().is_some());
    }
}
