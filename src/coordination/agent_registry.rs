//! Component B: agent registry. One record per live agent in the `agents`
//! bucket, keyed by agent id. Every operation is a thin pass-through to the
//! substrate — the registry performs no retries (§4.B).

use super::models::{AgentCard, AgentStatus};
use crate::error::{ForgeError, Result};
use crate::substrate::Substrate;
use chrono::Utc;
use std::sync::Arc;

const BUCKET: &str = "agents";

pub struct AgentRegistry {
    substrate: Arc<dyn Substrate>,
}

impl AgentRegistry {
    pub fn new(substrate: Arc<dyn Substrate>) -> Self {
        Self { substrate }
    }

    /// Unconditional put. Resets status to idle, stamps `started_at` and
    /// `last_heartbeat` to now — re-registering an offline agent clears the
    /// terminal state, per the `AgentCard` invariant.
    pub async fn register(&self, mut card: AgentCard) -> Result<()> {
        let now = Utc::now();
        card.status = AgentStatus::Idle;
        card.started_at = now;
        card.last_heartbeat = now;
        let bytes = serde_json::to_vec(&card)?;
        self.substrate.put(BUCKET, &card.id, bytes).await?;
        Ok(())
    }

    /// Not CAS: heartbeat races are benign, the monitor only cares that
    /// `last_heartbeat` is recent enough (§4.B, §5).
    pub async fn heartbeat(&self, id: &str) -> Result<()> {
        let mut card = self.get(id).await?.ok_or_else(|| ForgeError::not_found(id))?;
        card.last_heartbeat = Utc::now();
        let bytes = serde_json::to_vec(&card)?;
        self.substrate.put(BUCKET, id, bytes).await?;
        Ok(())
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: AgentStatus,
        task_id: &str,
    ) -> Result<()> {
        let mut card = self.get(id).await?.ok_or_else(|| ForgeError::not_found(id))?;
        card.status = status;
        card.current_task_id = task_id.to_string();
        let bytes = serde_json::to_vec(&card)?;
        self.substrate.put(BUCKET, id, bytes).await?;
        Ok(())
    }

    pub async fn deregister(&self, id: &str) -> Result<()> {
        self.substrate.delete(BUCKET, id).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<AgentCard>> {
        match self.substrate.get(BUCKET, id).await? {
            Some(entry) => Ok(Some(serde_json::from_slice(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Undefined order; an empty bucket yields an empty list, not an error.
    pub async fn list(&self) -> Result<Vec<AgentCard>> {
        let keys = self.substrate.list_keys(BUCKET).await?;
        let mut cards = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(card) = self.get(&key).await? {
                cards.push(card);
            }
        }
        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::embedded::EmbeddedSubstrate;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(Arc::new(EmbeddedSubstrate::new(None).unwrap()))
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let reg = registry();
        let card = AgentCard::new("a1", "worker-1", vec!["rust".into()]);
        reg.register(card).await.unwrap();
        let fetched = reg.get("a1").await.unwrap().unwrap();
        assert_eq!(fetched.status, AgentStatus::Idle);
        assert_eq!(fetched.name, "worker-1");
    }

    #[tokio::test]
    async fn empty_list_is_empty_not_error() {
        let reg = registry();
        assert!(reg.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn heartbeat_updates_last_heartbeat() {
        let reg = registry();
        reg.register(AgentCard::new("a1", "worker-1", vec![]))
            .await
            .unwrap();
        let before = reg.get("a1").await.unwrap().unwrap().last_heartbeat;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        reg.heartbeat("a1").await.unwrap();
        let after = reg.get("a1").await.unwrap().unwrap().last_heartbeat;
        assert!(after >= before);
    }

    #[tokio::test]
    async fn update_status_sets_current_task() {
        let reg = registry();
        reg.register(AgentCard::new("a1", "worker-1", vec![]))
            .await
            .unwrap();
        reg.update_status("a1", AgentStatus::Working, "t1")
            .await
            .unwrap();
        let card = reg.get("a1").await.unwrap().unwrap();
        assert_eq!(card.status, AgentStatus::Working);
        assert_eq!(card.current_task_id, "t1");
    }

    #[tokio::test]
    async fn deregister_removes_card() {
        let reg = registry();
        reg.register(AgentCard::new("a1", "worker-1", vec![]))
            .await
            .unwrap();
        reg.deregister("a1").await.unwrap();
        assert!(reg.get("a1").await.unwrap().is_none());
    }
}
