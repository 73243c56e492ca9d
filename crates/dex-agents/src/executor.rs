use crate::state::StateManager;
use async_trait::async_trait;
use dex_bus::{MessageBus, MessageHandler};
use dex_telemetry::{TelemetryEvent, TelemetrySink};
use dex_tools::ToolRegistry;
use dex_types::{ExecutionPlan, ExecutionResult, Message, MessageType, StepSummary, TraceError};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Subscribes to EXECUTE_REQUEST, dispatches each step whose dependencies
/// are satisfied by already-successful steps, and forwards the full
/// results map plus the execution trace to the verifier.
pub struct ExecutorAgent {
    bus: MessageBus,
    registry: ToolRegistry,
    state: StateManager,
    telemetry: Option<Arc<TelemetrySink>>,
    self_correction_attempts: u32,
}

impl ExecutorAgent {
    pub fn new(bus: MessageBus, registry: ToolRegistry, state: StateManager, telemetry: Option<Arc<TelemetrySink>>) -> Self {
        Self { bus, registry, state, telemetry, self_correction_attempts: 3 }
    }

    pub fn with_self_correction_attempts(mut self, attempts: u32) -> Self {
        self.self_correction_attempts = attempts;
        self
    }

    pub async fn register(self: Arc<Self>) {
        self.bus.subscribe(MessageType::ExecuteRequest, self.clone()).await;
    }

    /// Runs a plan's steps in listed order, skipping any step whose
    /// `depends_on` is not yet fully satisfied by a successful prior step.
    /// Returns the per-step results keyed by step id.
    pub async fn execute_plan(&self, task_id: Uuid, plan: &ExecutionPlan) -> HashMap<Uuid, ExecutionResult> {
        self.state.register_task(task_id).await;

        let mut results: HashMap<Uuid, ExecutionResult> = HashMap::new();
        let mut succeeded: HashSet<Uuid> = HashSet::new();

        for step in &plan.steps {
            if !step.depends_on.iter().all(|dep| succeeded.contains(dep)) {
                tracing::warn!(step_id = %step.id, "step skipped: unmet dependencies");
                continue;
            }

            let result = self.execute_step_with_retries(&step.tool_name, step.tool_args.clone(), step.id).await;

            if let Some(telemetry) = &self.telemetry {
                telemetry
                    .emit(TelemetryEvent::ToolCall { task_id: Some(task_id), tool: step.tool_name.clone(), success: result.success })
                    .await;
            }

            let summary = StepSummary {
                step_id: step.id,
                tool_name: step.tool_name.clone(),
                success: result.success,
                duration_ms: result.duration_ms,
            };
            let error = (!result.success).then(|| TraceError { step_id: step.id, error: result.error.clone().unwrap_or_default() });
            self.state.record_step(task_id, summary, error).await;

            if result.success {
                succeeded.insert(step.id);
            }
            results.insert(step.id, result);
        }

        let final_result = json!({
            "plan_id": plan.id,
            "results": results.iter().map(|(k, v)| (k.to_string(), v)).collect::<HashMap<_, _>>(),
        });
        self.state.mark_task_complete(task_id, Some(final_result)).await;

        results
    }

    /// Retries a failing step up to `self_correction_attempts` times.
    /// Retries are transparent: only the final attempt's result is kept,
    /// nothing is recorded as an additional step.
    async fn execute_step_with_retries(&self, tool_name: &str, tool_args: HashMap<String, Value>, step_id: Uuid) -> ExecutionResult {
        let args_value = Value::Object(tool_args.into_iter().collect());
        let mut attempt = 0;
        loop {
            attempt += 1;
            let start = std::time::Instant::now();
            let output = self.registry.validate_and_execute(tool_name, args_value.clone()).await;
            let duration_ms = start.elapsed().as_millis() as i64;

            if output.success || attempt > self.self_correction_attempts {
                return ExecutionResult {
                    step_id,
                    success: output.success,
                    output: output.data,
                    error: output.error,
                    duration_ms,
                    timestamp: chrono::Utc::now(),
                };
            }
        }
    }

    async fn handle_request(&self, message: Message) {
        let Some(plan_value) = message.payload.get("plan") else {
            tracing::error!("EXECUTE_REQUEST missing plan");
            return;
        };
        let plan: ExecutionPlan = match serde_json::from_value(plan_value.clone()) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "EXECUTE_REQUEST carried a malformed plan");
                return;
            }
        };
        let task_id = message
            .payload
            .get("task_id")
            .and_then(|v| serde_json::from_value::<Uuid>(v.clone()).ok())
            .unwrap_or(plan.task_id);

        let start = std::time::Instant::now();
        let results = self.execute_plan(task_id, &plan).await;
        let duration_ms = start.elapsed().as_millis() as i64;
        if let Some(telemetry) = &self.telemetry {
            telemetry.emit(TelemetryEvent::Latency { component: "executor".to_string(), task_id: Some(task_id), duration_ms }).await;
        }

        let trace = self.state.get_execution_state(task_id).await;

        let mut payload = HashMap::new();
        payload.insert("plan_id".to_string(), json!(plan.id));
        payload.insert("task_id".to_string(), json!(task_id));
        payload.insert(
            "results".to_string(),
            json!(results.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<HashMap<_, _>>()),
        );
        payload.insert("execution_trace".to_string(), serde_json::to_value(&trace).unwrap_or(Value::Null));

        let request = Message::reply_to(MessageType::VerifyRequest, &message, "executor").with_payload(payload);
        self.bus.publish(request).await;
    }
}

#[async_trait]
impl MessageHandler for ExecutorAgent {
    async fn handle(&self, message: Message) {
        self.handle_request(message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dex_bus::BusConfig;
    use dex_types::{PlanStep, TaskDefinition};

    fn plan_with_note_step() -> (Uuid, ExecutionPlan) {
        let task = TaskDefinition::new("save a note");
        let mut args = HashMap::new();
        args.insert("title".to_string(), json!("Title"));
        args.insert("body".to_string(), json!("Body"));
        let step = PlanStep::new(1, "save note", "note_create").with_args(args);
        (task.id, ExecutionPlan::new(task.id, vec![step], "test", "test"))
    }

    #[tokio::test]
    async fn dependent_step_is_skipped_when_dependency_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bus = MessageBus::new(BusConfig::default());
        let registry = ToolRegistry::with_default_tools(dir.path());
        let state = StateManager::new();
        let executor = ExecutorAgent::new(bus, registry, state, None);

        let task_id = Uuid::new_v4();
        let failing = PlanStep::new(1, "bad command", "shell_command");
        let mut dependent = PlanStep::new(2, "dependent note", "note_create");
        dependent.depends_on = vec![failing.id];
        let plan = ExecutionPlan::new(task_id, vec![failing.clone(), dependent.clone()], "test", "test");

        let results = executor.execute_plan(task_id, &plan).await;
        assert!(!results[&failing.id].success);
        assert!(!results.contains_key(&dependent.id));
    }

    #[tokio::test]
    async fn successful_step_marks_task_complete() {
        let dir = tempfile::tempdir().unwrap();
        let bus = MessageBus::new(BusConfig::default());
        let registry = ToolRegistry::with_default_tools(dir.path());
        let state = StateManager::new();
        let executor = ExecutorAgent::new(bus, registry, state.clone(), None);

        let (task_id, plan) = plan_with_note_step();
        let results = executor.execute_plan(task_id, &plan).await;
        assert!(results.values().all(|r| r.success));

        let trace = state.get_execution_state(task_id).await.unwrap();
        assert_eq!(trace.status, dex_types::TaskStatus::Completed);
    }
}
