//! Wires the four ambient subsystems (tools, risk, memory, notifications)
//! and the [`dex_agents::AgentSystem`] pipeline into one handle, and exposes
//! the single `submit_task` path both the CLI `run` subcommand and the HTTP
//! `POST /tasks` route drive.

use async_trait::async_trait;
use dex_agents::AgentSystem;
use dex_bus::MessageHandler;
use dex_config::DexConfig;
use dex_memory::MemoryStore;
use dex_notify::NotifierSet;
use dex_risk::RiskEngine;
use dex_telemetry::TelemetrySink;
use dex_tools::ToolRegistry;
use dex_types::{Message, MessageType, TaskDefinition, VerificationResult};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

pub struct System {
    pub config: DexConfig,
    pub agents: AgentSystem,
    pub memory: Arc<MemoryStore>,
    pub telemetry: Arc<TelemetrySink>,
    pub notifier: Arc<NotifierSet>,
    pub reminders: Arc<dex_tools::ReminderStore>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("planner rejected the request: {0}")]
    PlanningFailed(String),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

impl System {
    pub async fn build(config: DexConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let registry = ToolRegistry::with_default_tools(&config.data_dir);
        let risk_engine = RiskEngine::new(config.risk_mode);
        let memory = Arc::new(MemoryStore::open(&config.data_dir.join("memory.db"), None)?);
        let telemetry = Arc::new(TelemetrySink::new(config.data_dir.join("telemetry.jsonl")));
        let notifier = Arc::new(NotifierSet::from_config(&config.notify));
        let reminders = Arc::new(dex_tools::ReminderStore::new(config.data_dir.join("reminders.json")));

        let agents = AgentSystem::start(registry, risk_engine, Some(memory.clone()), Some(telemetry.clone())).await;

        Ok(Self { config, agents, memory, telemetry, notifier, reminders })
    }

    /// Runs one request through the full planner → (confirmation) →
    /// executor → verifier pipeline and returns the verifier's verdict.
    /// `confirm` is consulted only when the plan's risk requires it; it
    /// returns `false` to cancel before execution.
    pub async fn submit_task<F>(&self, request: &str, confirm: F) -> Result<Outcome, SubmitError>
    where
        F: FnOnce(&dex_risk::RiskScore) -> bool,
    {
        let task = TaskDefinition::new(request);

        let plan_request = Message::new(MessageType::PlanRequest, "submitter", "planner")
            .with_payload(plan_request_payload(&task));

        let timeout = self.config.pipeline.request_timeout;
        let response = self
            .agents
            .bus
            .request_response(plan_request, timeout)
            .await
            .map_err(|_| SubmitError::Timeout("planner"))?;

        if response.message_type == MessageType::RequestFailed {
            let error = response.payload.get("error").and_then(|v| v.as_str()).unwrap_or("unknown error");
            return Err(SubmitError::PlanningFailed(error.to_string()));
        }

        let plan_value = response.payload.get("plan").cloned().unwrap_or(serde_json::Value::Null);
        let plan: dex_types::ExecutionPlan = serde_json::from_value(plan_value.clone())
            .map_err(|e| SubmitError::PlanningFailed(format!("malformed plan reply: {e}")))?;

        let risk: dex_risk::RiskScore = plan
            .metadata
            .get("risk_score")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(dex_risk::RiskScore { level: dex_risk::RiskLevel::Low, score: 0.0, reasoning: String::new(), mitigations: Vec::new() });

        if self.agents_risk_engine_requires(&risk) && !confirm(&risk) {
            return Ok(Outcome::Cancelled { plan, risk });
        }

        let catcher = Arc::new(VerifyCatcher::new(task.id));
        let (subscription_id, waiter) = catcher.subscribe(&self.agents.bus).await;

        let execute_request = Message::new(MessageType::ExecuteRequest, "submitter", "executor")
            .with_payload(execute_request_payload(&plan, task.id));
        self.agents.bus.publish(execute_request).await;

        let verification = tokio::time::timeout(timeout, waiter).await;
        self.agents.bus.unsubscribe(subscription_id).await;
        let verification = verification
            .map_err(|_| SubmitError::Timeout("verifier"))?
            .map_err(|_| SubmitError::Timeout("verifier"))?;

        Ok(Outcome::Verified { plan, risk, verification })
    }

    fn agents_risk_engine_requires(&self, risk: &dex_risk::RiskScore) -> bool {
        RiskEngine::new(self.config.risk_mode).requires_confirmation(risk)
    }
}

pub enum Outcome {
    Cancelled { plan: dex_types::ExecutionPlan, risk: dex_risk::RiskScore },
    Verified { plan: dex_types::ExecutionPlan, risk: dex_risk::RiskScore, verification: VerificationResult },
}

fn plan_request_payload(task: &TaskDefinition) -> std::collections::HashMap<String, serde_json::Value> {
    let mut payload = std::collections::HashMap::new();
    payload.insert("task".to_string(), serde_json::to_value(task).unwrap_or(serde_json::Value::Null));
    payload.insert("available_tools".to_string(), serde_json::Value::Array(Vec::new()));
    payload
}

fn execute_request_payload(plan: &dex_types::ExecutionPlan, task_id: Uuid) -> std::collections::HashMap<String, serde_json::Value> {
    let mut payload = std::collections::HashMap::new();
    payload.insert("plan".to_string(), serde_json::to_value(plan).unwrap_or(serde_json::Value::Null));
    payload.insert("task_id".to_string(), serde_json::json!(task_id));
    payload
}

/// One-shot broadcast listener that resolves when a `VerifyResponse` for
/// `task_id` arrives. The executor and verifier only communicate over the
/// bus, never back to this caller directly, so this is the seam where the
/// submitter observes the end of the pipeline. Grounded on the same
/// oneshot-waiter idiom `dex_bus::MessageBus` uses internally for
/// `request_response`, since the bus's own correlation id is already
/// consumed by the planner round trip and cannot double as the waiter key
/// for the execute/verify leg.
struct VerifyCatcher {
    task_id: Uuid,
    sender: Mutex<Option<oneshot::Sender<VerificationResult>>>,
}

impl VerifyCatcher {
    fn new(task_id: Uuid) -> Self {
        Self { task_id, sender: Mutex::new(None) }
    }

    async fn subscribe(self: &Arc<Self>, bus: &dex_bus::MessageBus) -> (Uuid, oneshot::Receiver<VerificationResult>) {
        let (tx, rx) = oneshot::channel();
        *self.sender.lock().await = Some(tx);
        let id = bus.subscribe_broadcast(self.clone()).await;
        (id, rx)
    }
}

#[async_trait]
impl MessageHandler for VerifyCatcher {
    async fn handle(&self, message: Message) {
        if message.message_type != MessageType::VerifyResponse {
            return;
        }
        let Some(task_id) = message.payload.get("task_id").and_then(|v| serde_json::from_value::<Uuid>(v.clone()).ok()) else {
            return;
        };
        if task_id != self.task_id {
            return;
        }
        let verification = VerificationResult {
            plan_id: message.payload.get("plan_id").and_then(|v| serde_json::from_value(v.clone()).ok()).unwrap_or(Uuid::new_v4()),
            task_id,
            verified: message.payload.get("verified").and_then(|v| v.as_bool()).unwrap_or(false),
            issues: message.payload.get("issues").and_then(|v| serde_json::from_value(v.clone()).ok()).unwrap_or_default(),
            recommendations: message.payload.get("recommendations").and_then(|v| serde_json::from_value(v.clone()).ok()).unwrap_or_default(),
            verified_at: chrono::Utc::now(),
            verified_by: "verifier".to_string(),
        };
        if let Some(sender) = self.sender.lock().await.take() {
            let _ = sender.send(verification);
        }
    }
}
