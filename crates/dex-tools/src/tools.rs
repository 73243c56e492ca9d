use crate::{object_schema, NoteStore, ReminderStore, Tool, ToolSchema};
use async_trait::async_trait;
use chrono::Utc;
use dex_types::{Reminder, ReminderPriority};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn str_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

pub struct ShellCommandTool;

#[async_trait]
impl Tool for ShellCommandTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "shell_command".into(),
            description: "Run a shell command and capture stdout/stderr".into(),
            input_schema: object_schema(
                json!({
                    "command": {"type": "string"},
                    "timeout": {"type": "integer", "default": 30},
                }),
                &["command"],
            ),
        }
    }

    fn validate(&self, args: &Value) -> Result<(), String> {
        match str_arg(args, "command") {
            Some(cmd) if !cmd.trim().is_empty() => Ok(()),
            _ => Err("`command` must be a non-empty string".into()),
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let command = str_arg(&args, "command").unwrap_or_default();
        let timeout_secs = args.get("timeout").and_then(|v| v.as_u64()).unwrap_or(30).min(300);

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = tokio::process::Command::new("cmd");
            c.arg("/C").arg(&command);
            c
        } else {
            let mut c = tokio::process::Command::new("sh");
            c.arg("-c").arg(&command);
            c
        };

        let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()).await??;
        Ok(json!({
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "exit_code": output.status.code(),
        }))
    }
}

pub struct FileReadTool;

#[async_trait]
impl Tool for FileReadTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "file_read".into(),
            description: "Read the contents of a file".into(),
            input_schema: object_schema(json!({"path": {"type": "string"}}), &["path"]),
        }
    }

    fn validate(&self, args: &Value) -> Result<(), String> {
        match str_arg(args, "path") {
            Some(p) if !p.is_empty() => Ok(()),
            _ => Err("`path` must be a non-empty string".into()),
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let path = str_arg(&args, "path").unwrap_or_default();
        let contents = tokio::fs::read_to_string(&path).await?;
        Ok(json!({"path": path, "contents": contents}))
    }
}

pub struct FileWriteTool;

#[async_trait]
impl Tool for FileWriteTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "file_write".into(),
            description: "Write content to a file, creating parent directories as needed".into(),
            input_schema: object_schema(
                json!({"path": {"type": "string"}, "content": {"type": "string"}}),
                &["path", "content"],
            ),
        }
    }

    fn validate(&self, args: &Value) -> Result<(), String> {
        match str_arg(args, "path") {
            Some(p) if !p.is_empty() => Ok::<(), String>(()),
            _ => return Err("`path` must be a non-empty string".into()),
        }?;
        if args.get("content").and_then(|v| v.as_str()).is_none() {
            return Err("`content` must be a string".into());
        }
        Ok(())
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let path = str_arg(&args, "path").unwrap_or_default();
        let content = str_arg(&args, "content").unwrap_or_default();
        if let Some(parent) = std::path::Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&path, &content).await?;
        Ok(json!({"path": path, "bytes_written": content.len()}))
    }
}

pub struct NoteCreateTool {
    pub notes: Arc<NoteStore>,
}

#[async_trait]
impl Tool for NoteCreateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "note_create".into(),
            description: "Create a note".into(),
            input_schema: object_schema(
                json!({"title": {"type": "string"}, "body": {"type": "string"}}),
                &["body"],
            ),
        }
    }

    fn validate(&self, args: &Value) -> Result<(), String> {
        match str_arg(args, "body") {
            Some(b) if !b.is_empty() => Ok(()),
            _ => Err("`body` must be a non-empty string".into()),
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let title = str_arg(&args, "title").unwrap_or_else(|| "Untitled".to_string());
        let body = str_arg(&args, "body").unwrap_or_default();
        let note = self.notes.create(&title, &body).await?;
        Ok(serde_json::to_value(note)?)
    }
}

pub struct NoteListTool {
    pub notes: Arc<NoteStore>,
}

#[async_trait]
impl Tool for NoteListTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "note_list".into(),
            description: "List all notes".into(),
            input_schema: object_schema(json!({}), &[]),
        }
    }

    fn validate(&self, _args: &Value) -> Result<(), String> {
        Ok(())
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
        let notes = self.notes.list().await?;
        Ok(serde_json::to_value(notes)?)
    }
}

pub struct ReminderSetTool {
    pub reminders: Arc<ReminderStore>,
}

#[async_trait]
impl Tool for ReminderSetTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "reminder_set".into(),
            description: "Create a reminder from a relative or clock-style time expression".into(),
            input_schema: object_schema(
                json!({
                    "message": {"type": "string"},
                    "time": {"type": "string", "description": "e.g. '5m', '2h', '3d', '3pm', 'tomorrow', 'tomorrow 3pm'"},
                    "priority": {"type": "string", "enum": ["low", "normal", "high"]},
                }),
                &["message", "time"],
            ),
        }
    }

    fn validate(&self, args: &Value) -> Result<(), String> {
        match str_arg(args, "message") {
            Some(m) if !m.is_empty() => {}
            _ => return Err("`message` must be a non-empty string".into()),
        }
        let raw = str_arg(args, "time").ok_or("`time` must be a string")?;
        crate::time_expr::parse_reminder_time(&raw, Utc::now())?;
        Ok(())
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let message = str_arg(&args, "message").unwrap_or_default();
        let raw_time = str_arg(&args, "time").unwrap_or_else(|| "1m".to_string());
        let scheduled_time = crate::time_expr::parse_reminder_time(&raw_time, Utc::now())
            .map_err(|e| anyhow::anyhow!(e))?;
        let priority = match str_arg(&args, "priority").as_deref() {
            Some("low") => ReminderPriority::Low,
            Some("high") => ReminderPriority::High,
            _ => ReminderPriority::Normal,
        };
        let reminder = Reminder::new(message, scheduled_time, priority);
        let id = reminder.id;
        self.reminders.add(reminder).await?;
        Ok(json!({"id": id, "scheduled_time": scheduled_time}))
    }
}

pub struct ReminderListTool {
    pub reminders: Arc<ReminderStore>,
}

#[async_trait]
impl Tool for ReminderListTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "reminder_list".into(),
            description: "List all reminders".into(),
            input_schema: object_schema(json!({}), &[]),
        }
    }

    fn validate(&self, _args: &Value) -> Result<(), String> {
        Ok(())
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
        let reminders = self.reminders.list().await?;
        Ok(serde_json::to_value(reminders)?)
    }
}

pub struct EmailComposeTool;

#[async_trait]
impl Tool for EmailComposeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "email_compose".into(),
            description: "Compose an email draft (does not send)".into(),
            input_schema: object_schema(
                json!({
                    "to": {"type": "string"},
                    "subject": {"type": "string"},
                    "body": {"type": "string"},
                }),
                &["to", "subject"],
            ),
        }
    }

    fn validate(&self, args: &Value) -> Result<(), String> {
        match str_arg(args, "to") {
            Some(t) if t.contains('@') => Ok(()),
            _ => Err("`to` must be an email address".into()),
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        Ok(json!({
            "to": str_arg(&args, "to"),
            "subject": str_arg(&args, "subject").unwrap_or_default(),
            "body": str_arg(&args, "body").unwrap_or_default(),
            "drafted": true,
        }))
    }
}

pub struct BrowserOpenTool;

#[async_trait]
impl Tool for BrowserOpenTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "browser_open".into(),
            description: "Open a URL in the default browser".into(),
            input_schema: object_schema(json!({"url": {"type": "string"}}), &["url"]),
        }
    }

    fn validate(&self, args: &Value) -> Result<(), String> {
        match str_arg(args, "url") {
            Some(u) if u.starts_with("http://") || u.starts_with("https://") => Ok(()),
            _ => Err("`url` must start with http:// or https://".into()),
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let url = str_arg(&args, "url").unwrap_or_default();
        let (program, launch_args): (&str, Vec<&str>) = if cfg!(target_os = "windows") {
            ("cmd", vec!["/C", "start", "", &url])
        } else if cfg!(target_os = "macos") {
            ("open", vec![&url])
        } else {
            ("xdg-open", vec![&url])
        };
        let status = tokio::process::Command::new(program).args(launch_args).status().await?;
        Ok(json!({"url": url, "launched": status.success()}))
    }
}

pub struct AppLaunchTool;

#[async_trait]
impl Tool for AppLaunchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "app_launch".into(),
            description: "Launch a named application".into(),
            input_schema: object_schema(json!({"app_name": {"type": "string"}}), &["app_name"]),
        }
    }

    fn validate(&self, args: &Value) -> Result<(), String> {
        match str_arg(args, "app_name") {
            Some(a) if !a.is_empty() => Ok(()),
            _ => Err("`app_name` must be a non-empty string".into()),
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let app_name = str_arg(&args, "app_name").unwrap_or_default();
        let (program, launch_args): (&str, Vec<&str>) = if cfg!(target_os = "windows") {
            ("cmd", vec!["/C", "start", "", &app_name])
        } else if cfg!(target_os = "macos") {
            ("open", vec!["-a", &app_name])
        } else {
            (app_name.as_str(), vec![])
        };
        let status = tokio::process::Command::new(program).args(launch_args).status().await?;
        Ok(json!({"app_name": app_name, "launched": status.success()}))
    }
}

/// Fallback for requests that match no other template. Always succeeds with
/// a low-confidence echo; there is nothing to execute beyond acknowledging.
pub struct GenericChatTool;

#[async_trait]
impl Tool for GenericChatTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "generic_chat".into(),
            description: "Acknowledge a request that matched no specific tool".into(),
            input_schema: object_schema(json!({"message": {"type": "string"}}), &["message"]),
        }
    }

    fn validate(&self, _args: &Value) -> Result<(), String> {
        Ok(())
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        Ok(json!({"reply": str_arg(&args, "message").unwrap_or_default()}))
    }
}
