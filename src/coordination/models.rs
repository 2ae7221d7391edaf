//! Data model for the coordination layer (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Working,
    Offline,
}

/// One record per live agent, stored in the `agents` bucket keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub status: AgentStatus,
    #[serde(default)]
    pub current_task_id: String,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub machine: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl AgentCard {
    pub fn new(id: impl Into<String>, name: impl Into<String>, capabilities: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            capabilities,
            status: AgentStatus::Idle,
            current_task_id: String::new(),
            repo: None,
            branch: None,
            machine: None,
            started_at: now,
            last_heartbeat: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Implement,
    Review,
    Test,
    Refactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Submitted,
    Assigned,
    Working,
    Completed,
    Failed,
    InputRequired,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskContext {
    pub repo: String,
    pub base_branch: String,
    #[serde(default)]
    pub files_hint: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub summary: String,
}

/// One unit of work, stored in the `tasks` bucket keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub task_type: TaskType,
    #[serde(default)]
    pub specialization: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    pub status: TaskStatus,
    #[serde(default)]
    pub assigned_to: String,
    pub created_by: String,
    pub title: String,
    pub description: String,
    pub context: TaskContext,
    #[serde(default)]
    pub result: TaskResult,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a new task in `submitted` state; callers fill in identity
    /// fields before handing this to `TaskQueue::submit`.
    pub fn new(
        id: impl Into<String>,
        created_by: impl Into<String>,
        task_type: TaskType,
        title: impl Into<String>,
        description: impl Into<String>,
        context: TaskContext,
        dependencies: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            parent_id: None,
            task_type,
            specialization: Vec::new(),
            priority: 0,
            status: TaskStatus::Submitted,
            assigned_to: String::new(),
            created_by: created_by.into(),
            title: title.into(),
            description: description.into(),
            context,
            result: TaskResult::default(),
            dependencies,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One lock record, stored in the `locks` bucket keyed by the encoded
/// `(repo, relative_path)` pair (see `lock_manager::encode_key`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLock {
    pub agent_id: String,
    pub task_id: String,
    pub locked_at: DateTime<Utc>,
}

/// A planned task plus its predecessor edges, held only in the
/// orchestrator's in-memory `TaskPlan` — never persisted to the substrate.
#[derive(Debug, Clone)]
pub struct PlannedTask {
    pub task: Task,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPlan {
    pub tasks: Vec<PlannedTask>,
}

impl TaskPlan {
    pub fn new(tasks: Vec<PlannedTask>) -> Self {
        Self { tasks }
    }
}
