//! Networked substrate backend: a thin client over NATS JetStream. JetStream
//! KV buckets already speak this component's exact contract — revisioned
//! entries, create-if-absent, compare-and-swap on revision — and NATS
//! subjects are a direct match for `task.<id>.status` / `task.>`.

use super::{Entry, Subscription, Substrate};
use crate::error::{ForgeError, Result};
use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::Mutex;

pub struct NatsSubstrate {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    url: String,
    // Each bucket gets its own KV store, created lazily on first use.
    stores: Mutex<HashMap<String, kv::Store>>,
}

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_BASE_BACKOFF_MS: u64 = 200;

impl NatsSubstrate {
    /// Retries with jittered exponential backoff — the node's own startup
    /// (§7) is the first thing to observe a substrate that hasn't finished
    /// coming up yet, so a single failed dial shouldn't be `Fatal`.
    pub async fn connect(url: &str) -> Result<Self> {
        let mut last_err = None;
        for attempt in 0..CONNECT_ATTEMPTS {
            match async_nats::connect(url).await {
                Ok(client) => {
                    let jetstream = jetstream::new(client.clone());
                    return Ok(Self {
                        client,
                        jetstream,
                        url: url.to_string(),
                        stores: Mutex::new(HashMap::new()),
                    });
                }
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 == CONNECT_ATTEMPTS {
                        break;
                    }
                    let jitter_ms = rand::random::<u64>() % CONNECT_BASE_BACKOFF_MS;
                    let backoff = CONNECT_BASE_BACKOFF_MS * 2u64.pow(attempt) + jitter_ms;
                    tracing::warn!(attempt, backoff_ms = backoff, "substrate connect failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                }
            }
        }
        Err(ForgeError::Fatal(format!(
            "substrate connect failed after {CONNECT_ATTEMPTS} attempts: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// The URL peers should use to connect to this same substrate —
    /// published by a node that started an embedded server so other
    /// nodes can join the cluster (§6).
    pub fn client_url(&self) -> &str {
        &self.url
    }

    async fn store_for(&self, bucket: &str) -> Result<kv::Store> {
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }
        let store = self
            .jetstream
            .create_key_value(kv::Config {
                bucket: bucket.to_string(),
                history: 1,
                ..Default::default()
            })
            .await
            .map_err(|e| ForgeError::Substrate(format!("create bucket {bucket} failed: {e}")))?;
        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }
}

#[async_trait]
impl Substrate for NatsSubstrate {
    async fn create(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<u64> {
        let store = self.store_for(bucket).await?;
        store
            .create(key, value.into())
            .await
            .map_err(|e| ForgeError::AlreadyExists(format!("{bucket}/{key}: {e}")))
    }

    async fn put(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<u64> {
        let store = self.store_for(bucket).await?;
        store
            .put(key, value.into())
            .await
            .map_err(|e| ForgeError::Substrate(format!("put {bucket}/{key} failed: {e}")))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Entry>> {
        let store = self.store_for(bucket).await?;
        let entry = store
            .entry(key)
            .await
            .map_err(|e| ForgeError::Substrate(format!("get {bucket}/{key} failed: {e}")))?;
        Ok(entry.map(|e| Entry {
            revision: e.revision,
            value: e.value.to_vec(),
        }))
    }

    async fn update_if_revision(
        &self,
        bucket: &str,
        key: &str,
        expected_revision: u64,
        value: Vec<u8>,
    ) -> Result<u64> {
        let store = self.store_for(bucket).await?;
        store
            .update(key, value.into(), expected_revision)
            .await
            .map_err(|e| ForgeError::Precondition(format!("{bucket}/{key}: {e}")))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let store = self.store_for(bucket).await?;
        // Best-effort: a missing key is not an error here.
        let _ = store.delete(key).await;
        Ok(())
    }

    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>> {
        let store = self.store_for(bucket).await?;
        let mut keys_stream = store
            .keys()
            .await
            .map_err(|e| ForgeError::Substrate(format!("list {bucket} failed: {e}")))?;
        let mut keys = Vec::new();
        while let Some(key) = keys_stream.next().await {
            if let Ok(key) = key {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| ForgeError::Transient(format!("publish {subject} failed: {e}")))
    }

    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>> {
        let subscriber = self
            .client
            .subscribe(pattern.to_string())
            .await
            .map_err(|e| ForgeError::Substrate(format!("subscribe {pattern} failed: {e}")))?;
        Ok(Box::new(NatsSubscription { subscriber }))
    }
}

struct NatsSubscription {
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn next(&mut self) -> Option<(String, Vec<u8>)> {
        let message = self.subscriber.next().await?;
        Some((message.subject.to_string(), message.payload.to_vec()))
    }
}
