//! Component F: liveness monitor. Two independent loops sharing one
//! cancellation token: an event-driven loop that re-resolves the
//! orchestrator's dependency graph on every status message, and a periodic
//! sweep that reaps agents whose heartbeat has gone stale (§4.F).

use super::agent_registry::AgentRegistry;
use super::lock_manager::LockManager;
use super::models::{AgentStatus, TaskStatus};
use super::orchestrator::Orchestrator;
use super::task_queue::TaskQueue;
use crate::constants::{LIVENESS_SWEEP_INTERVAL_SECS, STALE_AGENT_THRESHOLD_SECS};
use crate::monitoring::Metrics;
use crate::substrate::Substrate;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct LivenessMonitor {
    substrate: Arc<dyn Substrate>,
    agents: Arc<AgentRegistry>,
    tasks: Arc<TaskQueue>,
    locks: Arc<LockManager>,
    orchestrator: Arc<Orchestrator>,
    metrics: Option<Arc<Metrics>>,
}

impl LivenessMonitor {
    pub fn new(
        substrate: Arc<dyn Substrate>,
        agents: Arc<AgentRegistry>,
        tasks: Arc<TaskQueue>,
        locks: Arc<LockManager>,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            substrate,
            agents,
            tasks,
            locks,
            orchestrator,
            metrics: None,
        }
    }

    /// Same as `new`, but wired up to increment the process-wide counters
    /// (§4.O) on every reap.
    pub fn with_metrics(
        substrate: Arc<dyn Substrate>,
        agents: Arc<AgentRegistry>,
        tasks: Arc<TaskQueue>,
        locks: Arc<LockManager>,
        orchestrator: Arc<Orchestrator>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            substrate,
            agents,
            tasks,
            locks,
            orchestrator,
            metrics: Some(metrics),
        }
    }

    /// Runs both loops concurrently until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let event_loop = self.clone().run_event_loop(cancel.clone());
        let sweep_loop = self.clone().run_sweep_loop(cancel.clone());
        tokio::join!(event_loop, sweep_loop);
    }

    async fn run_event_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut subscription = match self.substrate.subscribe("task.*.status").await {
            Ok(sub) => sub,
            Err(e) => {
                tracing::error!(error = %e, "monitor event loop failed to subscribe");
                return;
            }
        };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                message = subscription.next() => {
                    let Some(_) = message else { return };
                    if let Err(e) = self.orchestrator.resolve_dependencies().await {
                        tracing::error!(error = %e, "resolve_dependencies failed");
                    }
                }
            }
        }
    }

    async fn run_sweep_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(LIVENESS_SWEEP_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "liveness sweep failed");
                    }
                }
            }
        }
    }

    /// One pass of the periodic sweep, exposed directly so callers (and
    /// tests) don't have to wait out the real sweep interval to observe
    /// its effect.
    pub async fn sweep_once(&self) -> crate::error::Result<()> {
        let now = Utc::now();
        let agents = self.agents.list().await?;
        for agent in agents {
            if agent.status == AgentStatus::Offline {
                continue;
            }
            let age = now.signed_duration_since(agent.last_heartbeat);
            if age.num_seconds() <= STALE_AGENT_THRESHOLD_SECS as i64 {
                continue;
            }
            tracing::warn!(agent_id = %agent.id, age_secs = age.num_seconds(), "agent stale, reaping");
            if let Some(metrics) = &self.metrics {
                metrics.stale_agent_sweeps.fetch_add(1, Ordering::Relaxed);
            }
            self.agents
                .update_status(&agent.id, AgentStatus::Offline, "")
                .await?;

            for status in [TaskStatus::Assigned, TaskStatus::Working] {
                for task in self.tasks.list_by_status(status).await? {
                    if task.assigned_to == agent.id {
                        self.tasks.requeue(&task.id).await?;
                    }
                }
            }
            self.locks.release_all_by_agent(&agent.id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::models::{Task, TaskContext, TaskType};
    use crate::coordination::models::AgentCard;
    use crate::substrate::embedded::EmbeddedSubstrate;

    fn harness() -> (Arc<AgentRegistry>, Arc<TaskQueue>, Arc<LockManager>, Arc<Orchestrator>, Arc<dyn Substrate>) {
        let substrate: Arc<dyn Substrate> = Arc::new(EmbeddedSubstrate::new(None).unwrap());
        let agents = Arc::new(AgentRegistry::new(substrate.clone()));
        let tasks = Arc::new(TaskQueue::new(substrate.clone()));
        let locks = Arc::new(LockManager::new(substrate.clone()));
        let orchestrator = Arc::new(Orchestrator::new("orchestrator", tasks.clone()));
        (agents, tasks, locks, orchestrator, substrate)
    }

    #[tokio::test]
    async fn sweep_reaps_stale_agent_and_requeues_its_tasks() {
        let (agents, tasks, locks, orchestrator, substrate) = harness();
        let mut card = AgentCard::new("a1", "worker-1", vec![]);
        card.last_heartbeat = Utc::now() - chrono::Duration::seconds(200);
        agents.register(card).await.unwrap();
        // register() stamps last_heartbeat to now, so backdate it directly afterward.
        let mut stale = agents.get("a1").await.unwrap().unwrap();
        stale.last_heartbeat = Utc::now() - chrono::Duration::seconds(200);
        let bytes = serde_json::to_vec(&stale).unwrap();
        substrate.put("agents", "a1", bytes).await.unwrap();

        let task = Task::new("t1", "orchestrator", TaskType::Implement, "t", "d", TaskContext::default(), vec![]);
        tasks.submit(task).await.unwrap();
        tasks.claim("t1", "a1").await.unwrap();

        locks.acquire("repo1", "x.rs", "a1", "t1").await.unwrap();

        let monitor = LivenessMonitor::new(substrate, agents.clone(), tasks.clone(), locks.clone(), orchestrator);
        monitor.sweep_once().await.unwrap();

        let card = agents.get("a1").await.unwrap().unwrap();
        assert_eq!(card.status, AgentStatus::Offline);

        let task = tasks.get("t1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Submitted);
        assert!(task.assigned_to.is_empty());

        assert!(locks.get("repo1", "x.rs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_leaves_fresh_agents_alone() {
        let (agents, tasks, locks, orchestrator, substrate) = harness();
        agents.register(AgentCard::new("a1", "worker-1", vec![])).await.unwrap();

        let monitor = LivenessMonitor::new(substrate, agents.clone(), tasks, locks, orchestrator);
        monitor.sweep_once().await.unwrap();

        let card = agents.get("a1").await.unwrap().unwrap();
        assert_eq!(card.status, AgentStatus::Idle);
    }
}
