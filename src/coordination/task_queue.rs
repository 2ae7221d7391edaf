//! Component C: task queue. Stores `Task` records in the `tasks` bucket,
//! keyed by id. `claim` is the hot path that makes double-claim impossible
//! across the cluster: it reads a task's revision, then writes through
//! `update_if_revision`, so only the first of any number of racing callers
//! can win (§8 invariant 1).

use super::models::{Task, TaskResult, TaskStatus};
use crate::error::{ForgeError, Result};
use crate::monitoring::Metrics;
use crate::substrate::Substrate;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;

const BUCKET: &str = "tasks";

fn status_subject(task_id: &str) -> String {
    format!("task.{task_id}.status")
}

pub struct TaskQueue {
    substrate: Arc<dyn Substrate>,
    metrics: Option<Arc<Metrics>>,
}

impl TaskQueue {
    pub fn new(substrate: Arc<dyn Substrate>) -> Self {
        Self { substrate, metrics: None }
    }

    /// Same as `new`, but wired up to increment the process-wide counters
    /// (§4.O) on submit/claim.
    pub fn with_metrics(substrate: Arc<dyn Substrate>, metrics: Arc<Metrics>) -> Self {
        Self { substrate, metrics: Some(metrics) }
    }

    /// Unconditional: resubmitting an existing id overwrites it.
    pub async fn submit(&self, mut task: Task) -> Result<()> {
        let now = Utc::now();
        task.status = TaskStatus::Submitted;
        task.created_at = now;
        task.updated_at = now;
        let bytes = serde_json::to_vec(&task)?;
        self.substrate.put(BUCKET, &task.id, bytes.clone()).await?;
        self.substrate.publish(&status_subject(&task.id), bytes).await?;
        if let Some(metrics) = &self.metrics {
            metrics.tasks_submitted.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Task>> {
        match self.substrate.get(BUCKET, id).await? {
            Some(entry) => Ok(Some(serde_json::from_slice(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Succeeds only if the task is still `submitted` when the
    /// compare-and-swap lands. Any CAS failure — someone else claimed it,
    /// or it no longer exists — surfaces as `Precondition` ("AlreadyClaimed").
    pub async fn claim(&self, id: &str, agent_id: &str) -> Result<Task> {
        if let Some(metrics) = &self.metrics {
            metrics.claim_attempts.fetch_add(1, Ordering::Relaxed);
        }
        let entry = self
            .substrate
            .get(BUCKET, id)
            .await?
            .ok_or_else(|| ForgeError::not_found(id))?;
        let mut task: Task = serde_json::from_slice(&entry.value)?;
        if task.status != TaskStatus::Submitted {
            if let Some(metrics) = &self.metrics {
                metrics.claim_contention.fetch_add(1, Ordering::Relaxed);
            }
            return Err(ForgeError::Precondition(format!(
                "task {id} is not submitted (status: {:?})",
                task.status
            )));
        }
        task.status = TaskStatus::Assigned;
        task.assigned_to = agent_id.to_string();
        task.updated_at = Utc::now();
        let bytes = serde_json::to_vec(&task)?;
        self.substrate
            .update_if_revision(BUCKET, id, entry.revision, bytes.clone())
            .await
            .map_err(|_| {
                if let Some(metrics) = &self.metrics {
                    metrics.claim_contention.fetch_add(1, Ordering::Relaxed);
                }
                ForgeError::Precondition(format!("task {id} already claimed"))
            })?;
        let _ = self.substrate.publish(&status_subject(id), bytes).await;
        Ok(task)
    }

    async fn set_status(&self, id: &str, status: TaskStatus, result: Option<TaskResult>) -> Result<Task> {
        let entry = self
            .substrate
            .get(BUCKET, id)
            .await?
            .ok_or_else(|| ForgeError::not_found(id))?;
        let mut task: Task = serde_json::from_slice(&entry.value)?;
        task.status = status;
        if let Some(result) = result {
            task.result = result;
        }
        task.updated_at = Utc::now();
        let bytes = serde_json::to_vec(&task)?;
        self.substrate
            .update_if_revision(BUCKET, id, entry.revision, bytes.clone())
            .await?;
        let _ = self.substrate.publish(&status_subject(id), bytes).await;
        Ok(task)
    }

    pub async fn complete(&self, id: &str, result: TaskResult) -> Result<Task> {
        self.set_status(id, TaskStatus::Completed, Some(result)).await
    }

    pub async fn fail(&self, id: &str, result: TaskResult) -> Result<Task> {
        self.set_status(id, TaskStatus::Failed, Some(result)).await
    }

    /// Resets `assigned`/`working` tasks back to `submitted` and clears
    /// `assigned_to`. A no-op (returns the task unchanged) for any other
    /// status, since only those two states represent a live claim.
    pub async fn requeue(&self, id: &str) -> Result<Task> {
        let entry = self
            .substrate
            .get(BUCKET, id)
            .await?
            .ok_or_else(|| ForgeError::not_found(id))?;
        let mut task: Task = serde_json::from_slice(&entry.value)?;
        if !matches!(task.status, TaskStatus::Assigned | TaskStatus::Working) {
            return Ok(task);
        }
        task.status = TaskStatus::Submitted;
        task.assigned_to = String::new();
        task.updated_at = Utc::now();
        let bytes = serde_json::to_vec(&task)?;
        self.substrate
            .update_if_revision(BUCKET, id, entry.revision, bytes.clone())
            .await?;
        let _ = self.substrate.publish(&status_subject(id), bytes).await;
        Ok(task)
    }

    /// Returns an empty list, not an error, when nothing matches.
    pub async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let keys = self.substrate.list_keys(BUCKET).await?;
        let mut matching = Vec::new();
        for key in keys {
            if let Some(task) = self.get(&key).await? {
                if task.status == status {
                    matching.push(task);
                }
            }
        }
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::models::{TaskContext, TaskType};
    use crate::substrate::embedded::EmbeddedSubstrate;

    fn queue() -> TaskQueue {
        TaskQueue::new(Arc::new(EmbeddedSubstrate::new(None).unwrap()))
    }

    fn sample_task(id: &str) -> Task {
        Task::new(
            id,
            "orchestrator",
            TaskType::Implement,
            "title",
            "description",
            TaskContext::default(),
            vec![],
        )
    }

    #[tokio::test]
    async fn single_claim_wins_under_contention() {
        let q = Arc::new(queue());
        q.submit(sample_task("t1")).await.unwrap();

        let q1 = q.clone();
        let q2 = q.clone();
        let (r1, r2) = tokio::join!(q1.claim("t1", "a1"), q2.claim("t1", "a2"));

        let successes = [r1.is_ok(), r2.is_ok()].into_iter().filter(|ok| *ok).count();
        assert_eq!(successes, 1);

        let final_task = q.get("t1").await.unwrap().unwrap();
        assert_eq!(final_task.status, TaskStatus::Assigned);
        assert!(!final_task.assigned_to.is_empty());
    }

    #[tokio::test]
    async fn claim_on_non_submitted_task_fails() {
        let q = queue();
        q.submit(sample_task("t1")).await.unwrap();
        q.claim("t1", "a1").await.unwrap();
        let err = q.claim("t1", "a2").await.unwrap_err();
        assert!(matches!(err, ForgeError::Precondition(_)));
    }

    #[tokio::test]
    async fn requeue_clears_assignment() {
        let q = queue();
        q.submit(sample_task("t1")).await.unwrap();
        q.claim("t1", "a1").await.unwrap();
        let task = q.requeue("t1").await.unwrap();
        assert_eq!(task.status, TaskStatus::Submitted);
        assert!(task.assigned_to.is_empty());
    }

    #[tokio::test]
    async fn list_by_status_empty_is_empty_vec() {
        let q = queue();
        assert!(q
            .list_by_status(TaskStatus::Completed)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn complete_records_result() {
        let q = queue();
        q.submit(sample_task("t1")).await.unwrap();
        q.claim("t1", "a1").await.unwrap();
        let task = q
            .complete(
                "t1",
                TaskResult {
                    branch: "feature/x".into(),
                    summary: "done".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.branch, "feature/x");
    }
}
