//! Process-wide tracing initialization plus a JSONL event sink for the
//! `latency` / `tool_call` / `risk` events the pipeline emits. The tracing
//! subscriber is for operational visibility; the JSONL file is for offline
//! analysis and is never read back by the core itself.

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Initializes the global tracing subscriber once. Safe to call more than
/// once in a process (e.g. across tests): later calls are no-ops.
pub fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Latency { component: String, task_id: Option<Uuid>, duration_ms: i64 },
    ToolCall { task_id: Option<Uuid>, tool: String, success: bool },
    Risk { task_id: Option<Uuid>, level: String, score: f64 },
}

#[derive(Serialize)]
struct Envelope<'a> {
    timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    event: &'a TelemetryEvent,
}

/// Append-only JSONL sink. Failures (disk full, permission denied) are
/// logged and otherwise swallowed: telemetry must never fail the task it
/// describes.
pub struct TelemetrySink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TelemetrySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub async fn emit(&self, event: TelemetryEvent) {
        if let Err(err) = self.try_emit(&event).await {
            tracing::warn!(error = %err, "failed to write telemetry event");
        }
    }

    async fn try_emit(&self, event: &TelemetryEvent) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let envelope = Envelope { timestamp: chrono::Utc::now(), event };
        let mut line = serde_json::to_string(&envelope)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn to_value(event: &TelemetryEvent) -> Value {
    serde_json::to_value(event).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TelemetrySink::new(dir.path().join("telemetry.jsonl"));
        sink.emit(TelemetryEvent::ToolCall { task_id: None, tool: "note_create".into(), success: true }).await;
        sink.emit(TelemetryEvent::Latency { component: "executor".into(), task_id: None, duration_ms: 12 }).await;

        let contents = tokio::fs::read_to_string(sink.path()).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
