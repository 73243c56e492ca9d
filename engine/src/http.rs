//! Read-only dashboard views plus the one write endpoint, `POST /tasks`,
//! that enqueues a task through the same [`crate::system::System::submit_task`]
//! path the CLI `run` subcommand uses. Route-table shape (one small handler
//! per `GET`, `State<Arc<..>>` extraction, `Json` in and out) follows this
//! corpus's axum convention; the full original route table is not carried
//! over since this surface is a read-only dashboard, not a session/agent API.

use crate::system::{Outcome, System};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub fn router(system: Arc<System>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(state))
        .route("/telemetry", get(telemetry))
        .route("/reminders", get(reminders))
        .route("/notes", get(notes))
        .route("/config", get(config))
        .route("/tasks", post(create_task))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(system)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn state(State(system): State<Arc<System>>) -> Json<Value> {
    let active = system.agents.state.get_active_tasks().await;
    Json(json!({"active_tasks": active}))
}

async fn telemetry(State(system): State<Arc<System>>) -> Json<Value> {
    let path = system.telemetry.path();
    let lines = tokio::fs::read_to_string(path).await.unwrap_or_default();
    let events: Vec<Value> = lines.lines().filter_map(|line| serde_json::from_str(line).ok()).collect();
    Json(json!({"events": events}))
}

async fn reminders(State(system): State<Arc<System>>) -> Json<Value> {
    match system.reminders.list().await {
        Ok(reminders) => Json(json!({"reminders": reminders})),
        Err(err) => Json(json!({"error": err.to_string()})),
    }
}

async fn notes(State(system): State<Arc<System>>) -> Json<Value> {
    let store = dex_tools::NoteStore::new(system.config.data_dir.join("notes"));
    match store.list().await {
        Ok(notes) => Json(json!({"notes": notes})),
        Err(err) => Json(json!({"error": err.to_string()})),
    }
}

/// Secret-redacted: API keys, SMTP passwords and Twilio tokens are never
/// serialized into the dashboard response.
async fn config(State(system): State<Arc<System>>) -> Json<Value> {
    let cfg = &system.config;
    Json(json!({
        "data_dir": cfg.data_dir,
        "time_zone": cfg.time_zone,
        "log_level": cfg.log_level,
        "risk_mode": cfg.risk_mode,
        "reminder_check_interval_secs": cfg.reminder_check_interval.as_secs(),
        "http_host": cfg.http_host,
        "http_port": cfg.http_port,
        "planner_provider": cfg.planner.provider,
        "planner_model": cfg.planner.model_name,
        "notify_smtp_configured": cfg.notify.smtp.is_some(),
        "notify_whatsapp_configured": cfg.notify.whatsapp.is_some(),
        "notify_webhook_configured": cfg.notify.webhook_url.is_some(),
    }))
}

#[derive(Debug, Deserialize)]
struct CreateTaskInput {
    request: String,
}

async fn create_task(State(system): State<Arc<System>>, Json(input): Json<CreateTaskInput>) -> (StatusCode, Json<Value>) {
    // HIGH-risk plans submitted over HTTP have no interactive confirmer;
    // the dashboard is read-mostly, so a risky plan is reported back
    // un-executed rather than silently auto-confirmed or auto-rejected.
    let result = system.submit_task(&input.request, |_risk| false).await;
    match result {
        Ok(Outcome::Verified { plan, risk, verification }) => {
            (StatusCode::OK, Json(json!({"plan": plan, "risk": risk, "verification": verification})))
        }
        Ok(Outcome::Cancelled { plan, risk }) => (
            StatusCode::ACCEPTED,
            Json(json!({"plan": plan, "risk": risk, "status": "requires_confirmation"})),
        ),
        Err(err) => (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"error": err.to_string()}))),
    }
}
