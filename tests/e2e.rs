//! End-to-end scenarios for the coordination layer (E2E-1..3) and the
//! shell executor (E2E-4, E2E-5). The LSP round-trip (E2E-6) needs a real
//! `gopls`/`go` toolchain on the runner and is marked `#[ignore]`.

use forgemesh_core::coordination::models::{AgentCard, AgentStatus, Task, TaskContext, TaskPlan, TaskStatus, TaskType, PlannedTask};
use forgemesh_core::coordination::{AgentRegistry, LivenessMonitor, LockManager, Orchestrator, TaskQueue};
use forgemesh_core::substrate::embedded::EmbeddedSubstrate;
use forgemesh_core::substrate::Substrate;
use std::sync::Arc;

fn new_substrate() -> Arc<dyn Substrate> {
    Arc::new(EmbeddedSubstrate::new(None).unwrap())
}

#[tokio::test]
async fn e2e_1_double_claim() {
    let substrate = new_substrate();
    let tasks = Arc::new(TaskQueue::new(substrate));
    tasks
        .submit(Task::new("T", "orchestrator", TaskType::Implement, "t", "d", TaskContext::default(), vec![]))
        .await
        .unwrap();

    let t1 = tasks.clone();
    let t2 = tasks.clone();
    let (r1, r2) = tokio::join!(t1.claim("T", "a1"), t2.claim("T", "a2"));
    let winner = if r1.is_ok() { "a1" } else { "a2" };
    assert_ne!(r1.is_ok(), r2.is_ok());

    let task = tasks.get("T").await.unwrap().unwrap();
    assert_eq!(task.assigned_to, winner);
}

#[tokio::test]
async fn e2e_2_dependency_unlock() {
    let substrate = new_substrate();
    let tasks = Arc::new(TaskQueue::new(substrate));
    let orchestrator = Arc::new(Orchestrator::new("orchestrator", tasks.clone()));

    let t1 = Task::new("t1", "", TaskType::Implement, "t1", "d", TaskContext::default(), vec![]);
    let t2 = Task::new("t2", "", TaskType::Implement, "t2", "d", TaskContext::default(), vec!["t1".to_string()]);
    let plan = TaskPlan::new(vec![
        PlannedTask { task: t1.clone(), depends_on: vec![] },
        PlannedTask { task: t2.clone(), depends_on: vec!["t1".to_string()] },
    ]);

    let submitted = orchestrator.submit_plan(plan).await.unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].id, "t1");
    assert!(tasks.get("t2").await.unwrap().is_none());

    tasks.claim("t1", "a1").await.unwrap();
    tasks
        .complete("t1", forgemesh_core::coordination::models::TaskResult::default())
        .await
        .unwrap();

    let newly = orchestrator.resolve_dependencies().await.unwrap();
    assert_eq!(newly.len(), 1);
    assert_eq!(newly[0].id, "t2");
    assert!(tasks.get("t2").await.unwrap().is_some());

    let second_pass = orchestrator.resolve_dependencies().await.unwrap();
    assert!(second_pass.is_empty());
}

#[tokio::test]
async fn e2e_3_stale_agent_reaped() {
    let substrate = new_substrate();
    let agents = Arc::new(AgentRegistry::new(substrate.clone()));
    let tasks = Arc::new(TaskQueue::new(substrate.clone()));
    let locks = Arc::new(LockManager::new(substrate.clone()));
    let orchestrator = Arc::new(Orchestrator::new("orchestrator", tasks.clone()));

    agents.register(AgentCard::new("a1", "worker-1", vec![])).await.unwrap();
    let mut card = agents.get("a1").await.unwrap().unwrap();
    card.last_heartbeat = chrono::Utc::now() - chrono::Duration::seconds(200);
    substrate.put("agents", "a1", serde_json::to_vec(&card).unwrap()).await.unwrap();

    tasks
        .submit(Task::new("t1", "orchestrator", TaskType::Implement, "t", "d", TaskContext::default(), vec![]))
        .await
        .unwrap();
    tasks.claim("t1", "a1").await.unwrap();
    locks.acquire("repo1", "x.rs", "a1", "t1").await.unwrap();

    let monitor = LivenessMonitor::new(substrate, agents.clone(), tasks.clone(), locks.clone(), orchestrator);
    monitor.sweep_once().await.unwrap();

    assert_eq!(agents.get("a1").await.unwrap().unwrap().status, AgentStatus::Offline);
    let task = tasks.get("t1").await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Submitted);
    assert!(task.assigned_to.is_empty());
    assert!(locks.get("repo1", "x.rs").await.unwrap().is_none());
}
