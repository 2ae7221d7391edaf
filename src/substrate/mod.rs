//! The messaging substrate (§4.A): revisioned key/value buckets plus a
//! subject-based publish/subscribe channel. Two backends share one trait
//! so the coordination layer (agent registry, task queue, lock manager)
//! never has to know whether it is talking to the embedded in-process
//! store or a networked one.

pub mod embedded;
pub mod nats;

use crate::error::Result;
use async_trait::async_trait;

/// A revisioned value as returned by `get`/`create`/`update_if_revision`.
#[derive(Debug, Clone)]
pub struct Entry {
    pub revision: u64,
    pub value: Vec<u8>,
}

#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next message on this subscription. `None` means the
    /// subscription has been closed (substrate connection lost or
    /// explicitly unsubscribed).
    async fn next(&mut self) -> Option<(String, Vec<u8>)>;
}

#[async_trait]
pub trait Substrate: Send + Sync {
    /// Creates `key` in `bucket` with `value`. Fails with `AlreadyExists`
    /// if the key is already present.
    async fn create(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<u64>;

    /// Unconditional write. Overwrites any existing value and bumps the
    /// revision regardless of what it was.
    async fn put(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<u64>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Entry>>;

    /// Compare-and-swap: succeeds only if the stored revision still
    /// equals `expected_revision`. Fails with `Precondition` otherwise,
    /// including when the key has since been deleted.
    async fn update_if_revision(
        &self,
        bucket: &str,
        key: &str,
        expected_revision: u64,
        value: Vec<u8>,
    ) -> Result<u64>;

    /// Best-effort delete; does not error if the key is already absent.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Returns an empty vec, not an error, for an empty or absent bucket.
    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>>;

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()>;

    /// `pattern` uses NATS-style subject wildcards: `*` matches exactly
    /// one token, `>` matches one or more trailing tokens.
    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>>;
}

/// Matches a concrete subject (`task.abc123.status`) against a subject
/// pattern that may contain `*` and `>` wildcards (`task.*.status`,
/// `task.>`).
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let pattern_tokens: Vec<&str> = pattern.split('.').collect();
    let subject_tokens: Vec<&str> = subject.split('.').collect();

    let mut pi = 0;
    let mut si = 0;
    while pi < pattern_tokens.len() {
        match pattern_tokens[pi] {
            ">" => return true,
            "*" => {
                if si >= subject_tokens.len() {
                    return false;
                }
                pi += 1;
                si += 1;
            }
            literal => {
                if subject_tokens.get(si) != Some(&literal) {
                    return false;
                }
                pi += 1;
                si += 1;
            }
        }
    }
    si == subject_tokens.len()
}

#[cfg(test)]
mod tests {
    use super::subject_matches;

    #[test]
    fn exact_match() {
        assert!(subject_matches("task.abc.status", "task.abc.status"));
        assert!(!subject_matches("task.abc.status", "task.abc.other"));
    }

    #[test]
    fn single_token_wildcard() {
        assert!(subject_matches("task.*.status", "task.abc.status"));
        assert!(!subject_matches("task.*.status", "task.abc.def.status"));
    }

    #[test]
    fn trailing_wildcard() {
        assert!(subject_matches("task.>", "task.abc.status"));
        assert!(subject_matches("task.>", "task.abc"));
        assert!(!subject_matches("task.>", "agent.abc"));
    }
}
