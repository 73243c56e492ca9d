use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: Uuid,
    pub user_request: String,
    #[serde(default)]
    pub context: HashMap<String, Value>,
    #[serde(default)]
    pub constraints: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl TaskDefinition {
    pub fn new(user_request: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_request: user_request.into(),
            context: HashMap::new(),
            constraints: HashMap::new(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// A single entry in `ExecutionTrace::steps_executed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSummary {
    pub step_id: Uuid,
    pub tool_name: String,
    pub success: bool,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceError {
    pub step_id: Uuid,
    pub error: String,
}

/// Append-only record of what happened while executing a plan. The state
/// manager is the sole mutator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps_executed: Vec<StepSummary>,
    #[serde(default)]
    pub errors: Vec<TraceError>,
    pub final_result: Option<Value>,
}

impl ExecutionTrace {
    pub fn new(task_id: Uuid) -> Self {
        Self {
            task_id,
            status: TaskStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            steps_executed: Vec::new(),
            errors: Vec::new(),
            final_result: None,
        }
    }
}
