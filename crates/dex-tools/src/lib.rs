//! The closed tool taxonomy the executor dispatches against, plus the
//! registry and the `Invalid input: …` / `Execution failed: …` contract
//! that wraps every invocation uniformly.

mod notes;
mod reminders;
mod time_expr;
mod tools;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub use notes::{Note, NoteStore};
pub use reminders::ReminderStore;
pub use time_expr::parse_reminder_time;

/// Declared shape of a tool: a name, a human-readable description, and a
/// JSON-schema-like description of accepted arguments.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Uniform invocation outcome. `success`, `data` and `error` are the only
/// fields every tool output carries regardless of which tool produced it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    /// Validate `args` against the declared schema; return an error string
    /// (not a Rust `Result`) describing what's wrong if invalid.
    fn validate(&self, args: &Value) -> Result<(), String>;

    async fn execute(&self, args: Value) -> anyhow::Result<Value>;

    /// Two-tier exception handling: schema failures become
    /// `"Invalid input: …"`, execution failures become
    /// `"Execution failed: …"`. Never propagates a Rust error to callers.
    async fn validate_and_execute(&self, args: Value) -> ToolOutput {
        if let Err(reason) = self.validate(&args) {
            return ToolOutput::failed(format!("Invalid input: {reason}"));
        }
        match self.execute(args).await {
            Ok(data) => ToolOutput::ok(data),
            Err(err) => ToolOutput::failed(format!("Execution failed: {err}")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool `{0}` is already registered")]
    DuplicateName(String),
}

/// Name-keyed lookup over registered tools. Registration is rare (startup
/// only); lookups happen on every executor dispatch.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    /// Registry pre-populated with the closed taxonomy this core supports:
    /// `shell_command`, `file_read`, `file_write`, `note_create`,
    /// `note_list`, `reminder_set`, `reminder_list`, `email_compose`,
    /// `browser_open`, `app_launch`, `generic_chat`.
    pub fn with_default_tools(data_dir: &std::path::Path) -> Self {
        let notes = Arc::new(NoteStore::new(data_dir.join("notes")));
        let reminders = Arc::new(ReminderStore::new(data_dir.join("reminders.json")));

        let mut map: HashMap<String, Arc<dyn Tool>> = HashMap::new();
        map.insert("shell_command".into(), Arc::new(tools::ShellCommandTool));
        map.insert("file_read".into(), Arc::new(tools::FileReadTool));
        map.insert("file_write".into(), Arc::new(tools::FileWriteTool));
        map.insert("note_create".into(), Arc::new(tools::NoteCreateTool { notes: notes.clone() }));
        map.insert("note_list".into(), Arc::new(tools::NoteListTool { notes }));
        map.insert("reminder_set".into(), Arc::new(tools::ReminderSetTool { reminders: reminders.clone() }));
        map.insert("reminder_list".into(), Arc::new(tools::ReminderListTool { reminders }));
        map.insert("email_compose".into(), Arc::new(tools::EmailComposeTool));
        map.insert("browser_open".into(), Arc::new(tools::BrowserOpenTool));
        map.insert("app_launch".into(), Arc::new(tools::AppLaunchTool));
        map.insert("generic_chat".into(), Arc::new(tools::GenericChatTool));

        Self { tools: Arc::new(RwLock::new(map)) }
    }

    pub fn empty() -> Self {
        Self { tools: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn register(&self, name: impl Into<String>, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = name.into();
        let mut tools = self.tools.write().await;
        if tools.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        tools.insert(name, tool);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn schemas(&self) -> HashMap<String, ToolSchema> {
        self.tools
            .read()
            .await
            .iter()
            .map(|(name, tool)| (name.clone(), tool.schema()))
            .collect()
    }

    pub async fn list(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.schemas().await.into_values().collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Looks the tool up and runs `validate_and_execute`; returns a failed
    /// `ToolOutput` (not an error) when the name is unknown, matching every
    /// other failure mode of this contract.
    pub async fn validate_and_execute(&self, name: &str, args: Value) -> ToolOutput {
        match self.get(name).await {
            Some(tool) => tool.validate_and_execute(args).await,
            None => ToolOutput::failed(format!("Tool '{name}' not found")),
        }
    }
}

pub fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema { name: "echo".into(), description: "echo".into(), input_schema: json!({}) }
        }
        fn validate(&self, args: &Value) -> Result<(), String> {
            if args.get("text").is_none() {
                return Err("missing `text`".into());
            }
            Ok(())
        }
        async fn execute(&self, args: Value) -> anyhow::Result<Value> {
            Ok(args)
        }
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let registry = ToolRegistry::empty();
        registry.register("echo", Arc::new(EchoTool)).await.unwrap();
        let err = registry.register("echo", Arc::new(EchoTool)).await;
        assert!(matches!(err, Err(RegistryError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn invalid_input_is_reported_with_prefix() {
        let registry = ToolRegistry::empty();
        registry.register("echo", Arc::new(EchoTool)).await.unwrap();
        let out = registry.validate_and_execute("echo", json!({})).await;
        assert!(!out.success);
        assert!(out.error.unwrap().starts_with("Invalid input: "));
    }

    #[tokio::test]
    async fn unknown_tool_reports_not_found() {
        let registry = ToolRegistry::empty();
        let out = registry.validate_and_execute("nope", json!({})).await;
        assert!(!out.success);
        assert_eq!(out.error.unwrap(), "Tool 'nope' not found");
    }
}
