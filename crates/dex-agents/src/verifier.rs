use async_trait::async_trait;
use dex_bus::{MessageBus, MessageHandler};
use dex_types::{ExecutionTrace, Message, MessageType, VerificationResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Subscribes to VERIFY_REQUEST, checks the trace produced by the
/// executor, and broadcasts VERIFY_RESPONSE. The broadcast carries the
/// verdict plus the original `results` map and `execution_trace` so
/// downstream consumers (CLI, HTTP dashboard) can render outputs without a
/// second round trip.
pub struct VerifierAgent {
    bus: MessageBus,
}

impl VerifierAgent {
    pub fn new(bus: MessageBus) -> Self {
        Self { bus }
    }

    pub async fn register(self: Arc<Self>) {
        self.bus.subscribe(MessageType::VerifyRequest, self.clone()).await;
    }

    fn verify(plan_id: Uuid, task_id: Uuid, trace: &ExecutionTrace) -> VerificationResult {
        let mut issues = Vec::new();
        let mut recommendations = Vec::new();

        if trace.steps_executed.is_empty() {
            issues.push("No steps were executed".to_string());
            recommendations.push("Review the execution plan for issues".to_string());
        }

        if !trace.errors.is_empty() {
            issues.push(format!("Execution encountered {} error(s)", trace.errors.len()));
            for error in &trace.errors {
                issues.push(format!("  - Step {}: {}", error.step_id, error.error));
            }
            recommendations.push("Review errors and retry failed steps".to_string());
        }

        let all_successful = trace.steps_executed.iter().all(|s| s.success);
        let verified = issues.is_empty() && all_successful && !trace.steps_executed.is_empty();

        VerificationResult {
            plan_id,
            task_id,
            verified,
            issues,
            recommendations,
            verified_at: chrono::Utc::now(),
            verified_by: "verifier".to_string(),
        }
    }

    async fn handle_request(&self, message: Message) {
        let (Some(plan_id), Some(task_id)) = (
            message.payload.get("plan_id").and_then(|v| serde_json::from_value::<Uuid>(v.clone()).ok()),
            message.payload.get("task_id").and_then(|v| serde_json::from_value::<Uuid>(v.clone()).ok()),
        ) else {
            tracing::error!("VERIFY_REQUEST missing plan_id or task_id");
            return;
        };

        let trace: ExecutionTrace = match message.payload.get("execution_trace").and_then(|v| serde_json::from_value(v.clone()).ok()) {
            Some(t) => t,
            None => ExecutionTrace::new(task_id),
        };

        let verification = Self::verify(plan_id, task_id, &trace);

        let mut payload = HashMap::new();
        payload.insert("plan_id".to_string(), json!(plan_id));
        payload.insert("task_id".to_string(), json!(task_id));
        payload.insert("verified".to_string(), json!(verification.verified));
        payload.insert("issues".to_string(), json!(verification.issues));
        payload.insert("recommendations".to_string(), json!(verification.recommendations));
        payload.insert("results".to_string(), message.payload.get("results").cloned().unwrap_or(Value::Null));
        payload.insert("execution_trace".to_string(), serde_json::to_value(&trace).unwrap_or(Value::Null));

        let mut broadcast = Message::reply_to(MessageType::VerifyResponse, &message, "verifier")
            .with_payload(payload);
        broadcast.recipient = dex_types::BROADCAST_RECIPIENT.to_string();
        self.bus.publish(broadcast).await;
    }
}

#[async_trait]
impl MessageHandler for VerifierAgent {
    async fn handle(&self, message: Message) {
        self.handle_request(message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dex_types::{StepSummary, TraceError};

    #[test]
    fn no_steps_executed_is_unverified_with_recommendation() {
        let trace = ExecutionTrace::new(Uuid::new_v4());
        let result = VerifierAgent::verify(Uuid::new_v4(), trace.task_id, &trace);
        assert!(!result.verified);
        assert_eq!(result.issues[0], "No steps were executed");
        assert_eq!(result.recommendations[0], "Review the execution plan for issues");
    }

    #[test]
    fn all_steps_successful_with_no_errors_is_verified() {
        let mut trace = ExecutionTrace::new(Uuid::new_v4());
        trace.steps_executed.push(StepSummary { step_id: Uuid::new_v4(), tool_name: "note_create".into(), success: true, duration_ms: 3 });
        let result = VerifierAgent::verify(Uuid::new_v4(), trace.task_id, &trace);
        assert!(result.verified);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn errors_produce_exact_issue_format() {
        let mut trace = ExecutionTrace::new(Uuid::new_v4());
        let step_id = Uuid::new_v4();
        trace.steps_executed.push(StepSummary { step_id, tool_name: "shell_command".into(), success: false, duration_ms: 3 });
        trace.errors.push(TraceError { step_id, error: "boom".to_string() });
        let result = VerifierAgent::verify(Uuid::new_v4(), trace.task_id, &trace);
        assert!(!result.verified);
        assert_eq!(result.issues[1], format!("  - Step {step_id}: boom"));
    }
}
