use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// A single tool invocation within an `ExecutionPlan`.
///
/// `expected_output_schema` is carried through from the upstream planning
/// contract so the verifier can check shape, not just success, but nothing
/// in this core currently enforces it beyond presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: Uuid,
    pub order: u32,
    pub description: String,
    pub tool_name: String,
    #[serde(default)]
    pub tool_args: HashMap<String, Value>,
    #[serde(default)]
    pub depends_on: Vec<Uuid>,
    #[serde(default)]
    pub expected_output_schema: Option<Value>,
}

impl PlanStep {
    pub fn new(order: u32, description: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order,
            description: description.into(),
            tool_name: tool_name.into(),
            tool_args: HashMap::new(),
            depends_on: Vec::new(),
            expected_output_schema: None,
        }
    }

    pub fn with_args(mut self, args: HashMap<String, Value>) -> Self {
        self.tool_args = args;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: Uuid,
    pub task_id: Uuid,
    pub steps: Vec<PlanStep>,
    pub reasoning: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ExecutionPlan {
    pub fn new(task_id: Uuid, steps: Vec<PlanStep>, reasoning: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            steps,
            reasoning: reasoning.into(),
            confidence: 0.5,
            created_at: Utc::now(),
            created_by: created_by.into(),
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub step_id: Uuid,
    pub success: bool,
    #[serde(default)]
    pub output: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub plan_id: Uuid,
    pub task_id: Uuid,
    pub verified: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub verified_at: DateTime<Utc>,
    pub verified_by: String,
}
