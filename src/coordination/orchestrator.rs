//! Component E: orchestrator. Holds a `TaskPlan` in memory and drives
//! submission as dependencies complete. State is pure data passthrough —
//! the plan itself is never persisted, only the tasks it submits are
//! (§4.E).

use super::models::{PlannedTask, Task, TaskPlan, TaskStatus};
use super::task_queue::TaskQueue;
use crate::error::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

struct State {
    plan: TaskPlan,
    submitted: HashSet<String>,
    working_branch: Option<String>,
}

pub struct Orchestrator {
    agent_id: String,
    task_queue: Arc<TaskQueue>,
    state: Mutex<State>,
}

impl Orchestrator {
    pub fn new(agent_id: impl Into<String>, task_queue: Arc<TaskQueue>) -> Self {
        Self {
            agent_id: agent_id.into(),
            task_queue,
            state: Mutex::new(State {
                plan: TaskPlan::default(),
                submitted: HashSet::new(),
                working_branch: None,
            }),
        }
    }

    pub fn set_working_branch(&self, branch: impl Into<String>) {
        // Synchronous best-effort set; callers that need a guaranteed
        // ordering against submit_plan should await the async path instead.
        if let Ok(mut state) = self.state.try_lock() {
            state.working_branch = Some(branch.into());
        }
    }

    pub async fn working_branch(&self) -> Option<String> {
        self.state.lock().await.working_branch.clone()
    }

    /// Stores the plan, then submits every task with no dependencies,
    /// stamping `created_by` with this orchestrator's own agent id.
    pub async fn submit_plan(&self, plan: TaskPlan) -> Result<Vec<Task>> {
        let mut state = self.state.lock().await;
        state.plan = plan;
        let mut newly_submitted = Vec::new();
        for planned in &state.plan.tasks {
            if planned.depends_on.is_empty() && !state.submitted.contains(&planned.task.id) {
                let mut task = planned.task.clone();
                task.created_by = self.agent_id.clone();
                self.task_queue.submit(task.clone()).await?;
                state.submitted.insert(task.id.clone());
                newly_submitted.push(task);
            }
        }
        Ok(newly_submitted)
    }

    /// Scans completed tasks, submits any planned task whose dependencies
    /// are now all satisfied. Idempotent: a task already in the
    /// submitted-set is never resubmitted, so repeat calls with no new
    /// completions produce no duplicates.
    pub async fn resolve_dependencies(&self) -> Result<Vec<Task>> {
        let completed: HashSet<String> = self
            .task_queue
            .list_by_status(TaskStatus::Completed)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();

        let mut state = self.state.lock().await;
        let candidates: Vec<PlannedTask> = state
            .plan
            .tasks
            .iter()
            .filter(|p| {
                !state.submitted.contains(&p.task.id)
                    && p.depends_on.iter().all(|dep| completed.contains(dep))
            })
            .cloned()
            .collect();

        let mut newly_submitted = Vec::new();
        for planned in candidates {
            let mut task = planned.task.clone();
            task.created_by = self.agent_id.clone();
            self.task_queue.submit(task.clone()).await?;
            state.submitted.insert(task.id.clone());
            newly_submitted.push(task);
        }
        Ok(newly_submitted)
    }

    /// Planned tasks that still have at least one dependency — used for
    /// dashboards, not for scheduling.
    pub async fn pending_tasks(&self) -> Vec<Task> {
        let state = self.state.lock().await;
        state
            .plan
            .tasks
            .iter()
            .filter(|p| !p.depends_on.is_empty())
            .map(|p| p.task.clone())
            .collect()
    }
}
