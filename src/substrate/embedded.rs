//! Embedded, in-process substrate backend. Used for single-node mode
//! (the orchestrator running without a separate cluster transport).
//!
//! Storage is a plain `HashMap` guarded by a `tokio::sync::RwLock`, mirrored
//! to one JSON file per bucket when `storage_dir` is set so data survives a
//! node restart; otherwise it is volatile, exactly as §4.A allows.

use super::{Entry, Subscription, Substrate};
use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

type BucketMap = HashMap<String, (u64, Vec<u8>)>;

pub struct EmbeddedSubstrate {
    buckets: Arc<RwLock<HashMap<String, BucketMap>>>,
    storage_dir: Option<PathBuf>,
    // A single broadcast channel shared by every subscriber; each
    // subscription filters by subject pattern on receive. Fine at the
    // message volumes this system produces (task/agent status events).
    events: broadcast::Sender<(String, Vec<u8>)>,
}

impl EmbeddedSubstrate {
    pub fn new(storage_dir: Option<PathBuf>) -> Result<Self> {
        let (tx, _rx) = broadcast::channel(1024);
        let initial = if let Some(dir) = &storage_dir {
            std::fs::create_dir_all(dir)
                .map_err(|e| ForgeError::Fatal(format!("cannot create storage dir: {e}")))?;
            Self::load_from_disk(dir)
        } else {
            HashMap::new()
        };
        Ok(Self {
            buckets: Arc::new(RwLock::new(initial)),
            storage_dir,
            events: tx,
        })
    }

    fn bucket_path(&self, bucket: &str) -> Option<PathBuf> {
        self.storage_dir.as_ref().map(|dir| dir.join(format!("{bucket}.json")))
    }

    fn load_from_disk(dir: &std::path::Path) -> HashMap<String, BucketMap> {
        let mut buckets = HashMap::new();
        let Ok(entries) = std::fs::read_dir(dir) else {
            return buckets;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(bucket) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(contents) = std::fs::read_to_string(&path) {
                if let Ok(persisted) = serde_json::from_str::<HashMap<String, (u64, String)>>(&contents) {
                    let map: BucketMap = persisted
                        .into_iter()
                        .map(|(k, (rev, s))| (k, (rev, s.into_bytes())))
                        .collect();
                    buckets.insert(bucket.to_string(), map);
                }
            }
        }
        buckets
    }

    fn flush_bucket(&self, bucket: &str, map: &BucketMap) -> Result<()> {
        let Some(path) = self.bucket_path(bucket) else {
            return Ok(());
        };
        let persisted: HashMap<String, (u64, String)> = map
            .iter()
            .map(|(k, (rev, bytes))| (k.clone(), (*rev, String::from_utf8_lossy(bytes).to_string())))
            .collect();
        let contents = serde_json::to_string(&persisted)?;
        std::fs::write(path, contents)
            .map_err(|e| ForgeError::Substrate(format!("flush failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Substrate for EmbeddedSubstrate {
    async fn create(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<u64> {
        let mut buckets = self.buckets.write().await;
        let map = buckets.entry(bucket.to_string()).or_default();
        if map.contains_key(key) {
            return Err(ForgeError::AlreadyExists(format!("{bucket}/{key}")));
        }
        map.insert(key.to_string(), (1, value));
        self.flush_bucket(bucket, map)?;
        Ok(1)
    }

    async fn put(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<u64> {
        let mut buckets = self.buckets.write().await;
        let map = buckets.entry(bucket.to_string()).or_default();
        let revision = map.get(key).map(|(rev, _)| rev + 1).unwrap_or(1);
        map.insert(key.to_string(), (revision, value));
        self.flush_bucket(bucket, map)?;
        Ok(revision)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Entry>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .and_then(|map| map.get(key))
            .map(|(revision, value)| Entry {
                revision: *revision,
                value: value.clone(),
            }))
    }

    async fn update_if_revision(
        &self,
        bucket: &str,
        key: &str,
        expected_revision: u64,
        value: Vec<u8>,
    ) -> Result<u64> {
        let mut buckets = self.buckets.write().await;
        let map = buckets.entry(bucket.to_string()).or_default();
        match map.get(key) {
            Some((rev, _)) if *rev == expected_revision => {
                let new_rev = rev + 1;
                map.insert(key.to_string(), (new_rev, value));
                self.flush_bucket(bucket, map)?;
                Ok(new_rev)
            }
            Some((rev, _)) => Err(ForgeError::Precondition(format!(
                "{bucket}/{key}: expected revision {expected_revision}, found {rev}"
            ))),
            None => Err(ForgeError::Precondition(format!(
                "{bucket}/{key}: no longer exists"
            ))),
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        if let Some(map) = buckets.get_mut(bucket) {
            map.remove(key);
            self.flush_bucket(bucket, map)?;
        }
        Ok(())
    }

    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        // No subscribers is not an error: publishing is fire-and-forget.
        let _ = self.events.send((subject.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>> {
        Ok(Box::new(EmbeddedSubscription {
            pattern: pattern.to_string(),
            rx: self.events.subscribe(),
        }))
    }
}

struct EmbeddedSubscription {
    pattern: String,
    rx: broadcast::Receiver<(String, Vec<u8>)>,
}

#[async_trait]
impl Subscription for EmbeddedSubscription {
    async fn next(&mut self) -> Option<(String, Vec<u8>)> {
        loop {
            match self.rx.recv().await {
                Ok((subject, payload)) => {
                    if super::subject_matches(&self.pattern, &subject) {
                        return Some((subject, payload));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_create_again_fails() {
        let sub = EmbeddedSubstrate::new(None).unwrap();
        sub.create("tasks", "t1", b"v1".to_vec()).await.unwrap();
        let err = sub.create("tasks", "t1", b"v2".to_vec()).await.unwrap_err();
        assert!(matches!(err, ForgeError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn cas_fails_on_stale_revision() {
        let sub = EmbeddedSubstrate::new(None).unwrap();
        let rev = sub.create("tasks", "t1", b"v1".to_vec()).await.unwrap();
        sub.update_if_revision("tasks", "t1", rev, b"v2".to_vec())
            .await
            .unwrap();
        let err = sub
            .update_if_revision("tasks", "t1", rev, b"v3".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Precondition(_)));
    }

    #[tokio::test]
    async fn list_keys_empty_bucket_is_empty_vec() {
        let sub = EmbeddedSubstrate::new(None).unwrap();
        assert_eq!(sub.list_keys("nope").await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let sub = EmbeddedSubstrate::new(None).unwrap();
        sub.delete("locks", "missing").await.unwrap();
    }

    #[tokio::test]
    async fn publish_subscribe_roundtrip_respects_wildcards() {
        let sub = EmbeddedSubstrate::new(None).unwrap();
        let mut subscription = sub.subscribe("task.*.status").await.unwrap();
        sub.publish("task.t1.status", b"hello".to_vec())
            .await
            .unwrap();
        let (subject, payload) = subscription.next().await.unwrap();
        assert_eq!(subject, "task.t1.status");
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn survives_restart_when_storage_dir_configured() {
        let dir = tempfile::tempdir().unwrap();
        {
            let sub = EmbeddedSubstrate::new(Some(dir.path().to_path_buf())).unwrap();
            sub.create("agents", "a1", b"card".to_vec()).await.unwrap();
        }
        let restarted = EmbeddedSubstrate::new(Some(dir.path().to_path_buf())).unwrap();
        let entry = restarted.get("agents", "a1").await.unwrap().unwrap();
        assert_eq!(entry.value, b"card".to_vec());
    }
}
