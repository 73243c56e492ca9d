use dex_types::{ExecutionTrace, StepSummary, TaskStatus, TraceError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Single in-process authority over `ExecutionTrace`s. A task is in
/// `get_active_tasks` iff its trace status is not terminal.
#[derive(Clone, Default)]
pub struct StateManager {
    traces: Arc<RwLock<HashMap<Uuid, ExecutionTrace>>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_task(&self, task_id: Uuid) -> ExecutionTrace {
        let mut trace = ExecutionTrace::new(task_id);
        trace.status = TaskStatus::Running;
        self.traces.write().await.insert(task_id, trace.clone());
        trace
    }

    pub async fn record_step(&self, task_id: Uuid, summary: StepSummary, error: Option<TraceError>) {
        let mut traces = self.traces.write().await;
        if let Some(trace) = traces.get_mut(&task_id) {
            trace.steps_executed.push(summary);
            if let Some(error) = error {
                trace.errors.push(error);
            }
        }
    }

    pub async fn mark_task_complete(&self, task_id: Uuid, final_result: Option<Value>) {
        let mut traces = self.traces.write().await;
        if let Some(trace) = traces.get_mut(&task_id) {
            trace.status = if trace.errors.is_empty() { TaskStatus::Completed } else { TaskStatus::Failed };
            trace.ended_at = Some(chrono::Utc::now());
            trace.final_result = final_result;
        }
    }

    pub async fn get_execution_state(&self, task_id: Uuid) -> Option<ExecutionTrace> {
        self.traces.read().await.get(&task_id).cloned()
    }

    pub async fn get_active_tasks(&self) -> Vec<ExecutionTrace> {
        self.traces.read().await.values().filter(|t| !t.status.is_terminal()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registered_task_is_active_until_marked_complete() {
        let manager = StateManager::new();
        let task_id = Uuid::new_v4();
        manager.register_task(task_id).await;
        assert_eq!(manager.get_active_tasks().await.len(), 1);

        manager.mark_task_complete(task_id, None).await;
        assert!(manager.get_active_tasks().await.is_empty());
        let trace = manager.get_execution_state(task_id).await.unwrap();
        assert_eq!(trace.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn task_with_errors_completes_as_failed() {
        let manager = StateManager::new();
        let task_id = Uuid::new_v4();
        manager.register_task(task_id).await;
        manager
            .record_step(
                task_id,
                StepSummary { step_id: Uuid::new_v4(), tool_name: "shell_command".into(), success: false, duration_ms: 5 },
                Some(TraceError { step_id: Uuid::new_v4(), error: "boom".into() }),
            )
            .await;
        manager.mark_task_complete(task_id, None).await;
        let trace = manager.get_execution_state(task_id).await.unwrap();
        assert_eq!(trace.status, TaskStatus::Failed);
    }
}
