use crate::validator::PlanValidator;
use async_trait::async_trait;
use dex_bus::{MessageBus, MessageHandler};
use dex_memory::MemoryStore;
use dex_risk::RiskEngine;
use dex_types::{ExecutionPlan, MessageType, PlanStep, TaskDefinition};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// The planner's external collaborator: a model-backed planning service.
/// No concrete implementation ships here (Non-goal: no bespoke LLM
/// runtime) — only the seam, and the deterministic fallback below that
/// always answers.
#[async_trait]
pub trait PlanningBackend: Send + Sync {
    fn name(&self) -> &str;

    /// `memory_context` holds the top-K semantically similar memory
    /// entries plus the full session context, serialized for inclusion in
    /// a prompt. Returns `Ok(None)` when the backend declines or is
    /// unreachable; the planner tries the next backend or falls back.
    async fn plan(
        &self,
        task: &TaskDefinition,
        available_tools: &[String],
        memory_context: &[String],
    ) -> anyhow::Result<Option<ExecutionPlan>>;
}

/// Deterministic, lowercase-substring routing. Always produces a plan;
/// this is the backend of last resort and the only one wired in by
/// default.
pub struct RuleBasedPlanner;

#[async_trait]
impl PlanningBackend for RuleBasedPlanner {
    fn name(&self) -> &str {
        "rule_based_fallback"
    }

    async fn plan(
        &self,
        task: &TaskDefinition,
        _available_tools: &[String],
        _memory_context: &[String],
    ) -> anyhow::Result<Option<ExecutionPlan>> {
        Ok(Some(route(task)))
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn single_step_plan(
    task_id: Uuid,
    description: impl Into<String>,
    tool_name: impl Into<String>,
    tool_args: HashMap<String, Value>,
    reasoning: impl Into<String>,
    confidence: f64,
) -> ExecutionPlan {
    let step = PlanStep::new(1, description, tool_name).with_args(tool_args);
    let mut plan = ExecutionPlan::new(task_id, vec![step], reasoning, "planner");
    plan.confidence = confidence;
    plan
}

fn args(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// The nine-case priority routing described for the rule-based fallback.
/// Each arm MUST produce a plan with confidence in [0.5, 0.95].
fn route(task: &TaskDefinition) -> ExecutionPlan {
    let request = task.user_request.to_lowercase();
    let list_words = ["list", "show", "all"];

    if contains_any(&request, &["note", "notes", "save", "remember"]) {
        return if contains_any(&request, &list_words) {
            single_step_plan(task.id, "List notes", "note_list", args(&[]), "User wants to see their notes.", 0.9)
        } else {
            let title = context_str(task, "title").unwrap_or_else(|| "Note".to_string());
            let body = context_str(task, "content").unwrap_or_else(|| task.user_request.clone());
            single_step_plan(
                task.id,
                "Save note",
                "note_create",
                args(&[("title", json!(title)), ("body", json!(body))]),
                "User wants to save a note.",
                0.85,
            )
        };
    }

    if contains_any(&request, &["remind", "reminder", "alarm", "schedule"]) {
        return if contains_any(&request, &list_words) {
            single_step_plan(task.id, "List reminders", "reminder_list", args(&[]), "User wants to see active reminders.", 0.9)
        } else {
            plan_set_reminder(task, &request)
        };
    }

    if contains_any(&request, &["read", "show", "display", "content", "view"]) && (request.contains("file") || request.contains('.')) {
        let path = context_str(task, "path").unwrap_or_else(|| extract_file_path(&task.user_request));
        return single_step_plan(
            task.id,
            format!("Read file: {path}"),
            "file_read",
            args(&[("path", json!(path.clone()))]),
            format!("User requested to read {path}."),
            0.9,
        );
    }

    if contains_any(&request, &["write", "save", "create", "edit"]) && (request.contains("file") || request.contains(".txt")) {
        let path = context_str(task, "path").unwrap_or_else(|| "notes.txt".to_string());
        let content = context_str(task, "content").unwrap_or_else(|| task.user_request.clone());
        return single_step_plan(
            task.id,
            format!("Write to file: {path}"),
            "file_write",
            args(&[("path", json!(path.clone())), ("content", json!(content))]),
            format!("User wants to write content to {path}."),
            0.88,
        );
    }

    if contains_any(&request, &["list", "files", "directory", "dir", "show files", "file names", "files in"]) {
        let directory = context_str(task, "directory").unwrap_or_else(|| extract_directory(&task.user_request));
        let command = if cfg!(target_os = "windows") {
            format!("dir /B {directory}")
        } else {
            format!("ls -la {directory}")
        };
        return single_step_plan(
            task.id,
            format!("List files in {directory}"),
            "shell_command",
            args(&[("command", json!(command))]),
            format!("User requested to list files in {directory}."),
            0.9,
        );
    }

    const APP_KEYWORDS: &[&str] = &[
        "chrome", "chromium", "firefox", "edge", "safari", "brave", "explorer", "navigate", "website", "url", "http",
        "whatsapp", "discord", "teams", "slack", "telegram", "signal", "messenger", "spotify", "netflix", "youtube", "vscode",
    ];
    if contains_any(&request, APP_KEYWORDS) {
        if let Some(url) = extract_url(&task.user_request) {
            return single_step_plan(
                task.id,
                format!("Open {url}"),
                "browser_open",
                args(&[("url", json!(url.clone()))]),
                format!("User requested to open {url} in the browser."),
                0.95,
            );
        }
        let app_name = extract_app_name(&request);
        return single_step_plan(
            task.id,
            format!("Open {app_name}"),
            "app_launch",
            args(&[("app_name", json!(app_name.clone()))]),
            format!("User requested to open {app_name}. Using app launcher to launch application."),
            0.95,
        );
    }

    if contains_any(&request, &["settings", "preferences", "config"]) {
        let command = if cfg!(target_os = "windows") {
            "start ms-settings:".to_string()
        } else if cfg!(target_os = "macos") {
            "open /System/Library/PreferencePanes".to_string()
        } else {
            "xdg-open settings://".to_string()
        };
        return single_step_plan(
            task.id,
            "Open system settings",
            "shell_command",
            args(&[("command", json!(command))]),
            "User requested to open settings. Using shell command to launch settings application.",
            0.95,
        );
    }

    if contains_any(&request, &["send", "email", "message", "gmail"]) {
        let to = context_str(task, "to").unwrap_or_default();
        let subject = context_str(task, "subject").unwrap_or_default();
        let body = context_str(task, "body").unwrap_or_else(|| task.user_request.clone());
        return single_step_plan(
            task.id,
            "Compose email",
            "email_compose",
            args(&[("to", json!(to)), ("subject", json!(subject)), ("body", json!(body))]),
            "Email composition stub; sending is not implemented.",
            0.5,
        );
    }

    single_step_plan(
        task.id,
        format!("Acknowledge: {}", task.user_request),
        "generic_chat",
        args(&[("message", json!(task.user_request.clone()))]),
        format!("Generic plan for: {}", task.user_request),
        0.5,
    )
}

fn context_str(task: &TaskDefinition, key: &str) -> Option<String> {
    task.context.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn extract_file_path(request: &str) -> String {
    let patterns = [
        r"[A-Za-z]:[\\/][^\s]*",
        r"/[\S]*",
        r"\./[\S]*",
        r"[\w\-\.]+\.\w{2,}",
    ];
    for pattern in patterns {
        if let Some(m) = Regex::new(pattern).unwrap().find(request) {
            return m.as_str().trim().to_string();
        }
    }
    ".".to_string()
}

fn extract_directory(request: &str) -> String {
    let pattern = Regex::new(r"[A-Za-z]:[\\/][^\s]*|/[\S]*").unwrap();
    pattern.find(request).map(|m| m.as_str().trim().to_string()).unwrap_or_else(|| ".".to_string())
}

fn extract_url(request: &str) -> Option<String> {
    Regex::new(r"https?://\S+").unwrap().find(request).map(|m| m.as_str().to_string())
}

fn extract_app_name(request: &str) -> String {
    const SUPPORTED: &[&str] = &[
        "chrome", "chromium", "firefox", "edge", "safari", "brave", "whatsapp", "discord", "teams", "slack",
        "telegram", "signal", "messenger", "spotify", "netflix", "youtube", "vlc", "vscode", "explorer",
    ];
    SUPPORTED.iter().find(|app| request.contains(*app)).map(|s| s.to_string()).unwrap_or_else(|| "chrome".to_string())
}

/// Five patterns tried in order, matching `_plan_set_reminder`'s
/// extraction: minute/hour/day offsets, an absolute clock time, or
/// "tomorrow[ at ...]". Falls back to `"1m"` — not one hour — when
/// nothing matches.
fn extract_time_expression(request: &str) -> String {
    let rules: [(&str, fn(&regex::Captures<'_>) -> String); 5] = [
        (r"in\s+(\d+)\s*(?:minute|min|m)s?", |c| format!("{}m", &c[1])),
        (r"in\s+(\d+)\s*(?:hour|hr|h)s?", |c| format!("{}h", &c[1])),
        (r"in\s+(\d+)\s*(?:day|d)s?", |c| format!("{}d", &c[1])),
        (r"at\s+(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)", |c| c[1].replace(' ', "").to_lowercase()),
        (r"tomorrow(?:\s+at\s+(\d{1,2}(?::\d{2})?\s*(?:am|pm)?))?", |c| match c.get(1) {
            Some(time) => format!("tomorrow {}", time.as_str().replace(' ', "").to_lowercase()),
            None => "tomorrow".to_string(),
        }),
    ];

    for (pattern, render) in rules {
        if let Some(caps) = Regex::new(pattern).unwrap().captures(request) {
            return render(&caps);
        }
    }
    "1m".to_string()
}

fn extract_clean_message(request: &str, fallback: &str) -> String {
    let strip_time = Regex::new(
        r"(?i)(in\s+\d+\s*(?:minute|min|m|hour|hr|h|day|d)s?|at\s+\d{1,2}(?::\d{2})?\s*(?:am|pm)?|tomorrow(?:\s+at\s+\d{1,2}(?::\d{2})?\s*(?:am|pm)?)?)",
    )
    .unwrap();
    let without_time = strip_time.replace_all(request, "").trim().to_string();
    let strip_prefix = Regex::new(r"(?i)^remind\s+me\s+").unwrap();
    let cleaned = strip_prefix.replace(&without_time, "").trim().to_string();

    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        let mut chars = cleaned.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => cleaned,
        }
    }
}

fn plan_set_reminder(task: &TaskDefinition, request: &str) -> ExecutionPlan {
    let time = extract_time_expression(request);
    let message = extract_clean_message(request, &task.user_request);
    let priority = context_str(task, "priority").unwrap_or_else(|| "normal".to_string());

    single_step_plan(
        task.id,
        format!("Set reminder: {message} at {time}"),
        "reminder_set",
        args(&[("message", json!(message)), ("time", json!(time)), ("priority", json!(priority))]),
        "User wants to set a reminder.",
        0.85,
    )
}

/// Subscribes to PLAN_REQUEST, tries configured backends in order, falls
/// back to the rule-based router when every backend declines, attaches a
/// risk score, hard-gates on structural validity, and replies with
/// PLAN_RESPONSE or REQUEST_FAILED.
pub struct PlannerAgent {
    bus: MessageBus,
    backends: Vec<Arc<dyn PlanningBackend>>,
    risk_engine: RiskEngine,
    memory: Option<Arc<MemoryStore>>,
}

impl PlannerAgent {
    pub fn new(bus: MessageBus, risk_engine: RiskEngine, memory: Option<Arc<MemoryStore>>) -> Self {
        Self { bus, backends: vec![Arc::new(RuleBasedPlanner)], risk_engine, memory }
    }

    /// Prepend a model-backed backend so it is tried before the rule-based
    /// fallback.
    pub fn with_backend(mut self, backend: Arc<dyn PlanningBackend>) -> Self {
        self.backends.insert(0, backend);
        self
    }

    pub async fn register(self: Arc<Self>) {
        self.bus.subscribe(MessageType::PlanRequest, self.clone()).await;
    }

    async fn memory_context(&self, task: &TaskDefinition) -> Vec<String> {
        let Some(memory) = &self.memory else { return Vec::new() };
        let mut context = Vec::new();
        if let Ok(hits) = memory.search_semantic(&task.user_request, 3).await {
            context.extend(hits.into_iter().map(|h| h.entry.content));
        }
        if let Ok(session) = memory.get_all_session_context().await {
            context.extend(session.into_iter().map(|(k, v)| format!("{k}={v}")));
        }
        context
    }

    async fn generate_plan(&self, task: &TaskDefinition, available_tools: &[String]) -> Option<ExecutionPlan> {
        let memory_context = self.memory_context(task).await;
        for backend in &self.backends {
            match backend.plan(task, available_tools, &memory_context).await {
                Ok(Some(plan)) => return Some(plan),
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(backend = backend.name(), error = %err, "planning backend failed, trying next");
                }
            }
        }
        None
    }

    async fn handle_request(&self, message: dex_types::Message) {
        let Some(task_value) = message.payload.get("task") else {
            self.reply_failed(&message, "No task in request").await;
            return;
        };
        let task: TaskDefinition = match serde_json::from_value(task_value.clone()) {
            Ok(t) => t,
            Err(e) => {
                self.reply_failed(&message, &format!("Malformed task: {e}")).await;
                return;
            }
        };

        let available_tools: Vec<String> = message
            .payload
            .get("available_tools")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let Some(mut plan) = self.generate_plan(&task, &available_tools).await else {
            self.reply_failed(&message, "Failed to generate plan").await;
            return;
        };

        let risk = self.risk_engine.evaluate_plan(&plan);
        plan.metadata.insert("risk_score".to_string(), serde_json::to_value(&risk).unwrap_or(Value::Null));

        let outcome = PlanValidator::validate(&plan);
        if !outcome.is_valid() {
            self.reply_failed(&message, &outcome.errors.join("; ")).await;
            return;
        }

        let mut payload = HashMap::new();
        payload.insert("plan".to_string(), serde_json::to_value(&plan).unwrap_or(Value::Null));
        payload.insert("task_id".to_string(), json!(task.id));

        let reply = dex_types::Message::reply_to(MessageType::PlanResponse, &message, "planner").with_payload(payload);
        self.bus.publish(reply).await;
    }

    async fn reply_failed(&self, request: &dex_types::Message, error: &str) {
        let mut payload = HashMap::new();
        payload.insert("error".to_string(), json!(error));
        if let Some(task) = request.payload.get("task").and_then(|t| t.get("id")) {
            payload.insert("task_id".to_string(), task.clone());
        }
        let reply = dex_types::Message::reply_to(MessageType::RequestFailed, request, "planner").with_payload(payload);
        self.bus.publish(reply).await;
    }
}

#[async_trait]
impl MessageHandler for PlannerAgent {
    async fn handle(&self, message: dex_types::Message) {
        self.handle_request(message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(request: &str) -> TaskDefinition {
        TaskDefinition::new(request)
    }

    #[test]
    fn note_request_routes_to_note_create() {
        let plan = route(&task("remember to buy milk"));
        assert_eq!(plan.steps[0].tool_name, "note_create");
        assert!(plan.confidence >= 0.5 && plan.confidence <= 0.95);
    }

    #[test]
    fn list_notes_routes_to_note_list() {
        let plan = route(&task("show all my notes"));
        assert_eq!(plan.steps[0].tool_name, "note_list");
    }

    #[test]
    fn reminder_default_time_is_one_minute() {
        let plan = route(&task("remind me to call mom"));
        assert_eq!(plan.steps[0].tool_name, "reminder_set");
        assert_eq!(plan.steps[0].tool_args.get("time").and_then(|v| v.as_str()), Some("1m"));
    }

    #[test]
    fn reminder_extracts_relative_minutes() {
        let plan = route(&task("remind me in 5 minutes to submit the report"));
        assert_eq!(plan.steps[0].tool_args.get("time").and_then(|v| v.as_str()), Some("5m"));
        let message = plan.steps[0].tool_args.get("message").and_then(|v| v.as_str()).unwrap();
        assert!(!message.to_lowercase().contains("minutes"));
    }

    #[test]
    fn list_files_routes_to_shell_command() {
        let plan = route(&task("list files in /tmp"));
        assert_eq!(plan.steps[0].tool_name, "shell_command");
    }

    #[test]
    fn unmatched_request_routes_to_generic_chat() {
        let plan = route(&task("what is the meaning of life"));
        assert_eq!(plan.steps[0].tool_name, "generic_chat");
        assert_eq!(plan.confidence, 0.5);
    }

    #[test]
    fn browser_keyword_with_url_routes_to_browser_open() {
        let plan = route(&task("open https://example.com in chrome"));
        assert_eq!(plan.steps[0].tool_name, "browser_open");
    }

    #[test]
    fn app_keyword_without_url_routes_to_app_launch() {
        let plan = route(&task("open spotify"));
        assert_eq!(plan.steps[0].tool_name, "app_launch");
        assert_eq!(plan.steps[0].tool_args.get("app_name").and_then(|v| v.as_str()), Some("spotify"));
    }
}
