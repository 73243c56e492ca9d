use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Routable message types exchanged over the bus. Closed set: agents never
/// invent new variants at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    PlanRequest,
    PlanResponse,
    ExecuteRequest,
    ExecuteResponse,
    VerifyRequest,
    VerifyResponse,
    ToolCall,
    ToolResult,
    ToolError,
    AgentReady,
    AgentBusy,
    CancelRequest,
    Heartbeat,
    ContextUpdate,
    StateSync,
    RequestFailed,
    RecoverableError,
    CriticalError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Processing,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl MessageStatus {
    /// A terminal status must never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageStatus::Completed
                | MessageStatus::Failed
                | MessageStatus::Timeout
                | MessageStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub message_type: MessageType,
    pub sender: String,
    pub recipient: String,
    #[serde(default)]
    pub payload: HashMap<String, Value>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub correlation_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Message {
    pub fn new(message_type: MessageType, sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message_type,
            sender: sender.into(),
            recipient: recipient.into(),
            payload: HashMap::new(),
            status: MessageStatus::Sent,
            created_at: Utc::now(),
            sent_at: None,
            delivered_at: None,
            completed_at: None,
            correlation_id: None,
            parent_message_id: None,
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_payload(mut self, payload: HashMap<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn reply_to(message_type: MessageType, request: &Message, sender: impl Into<String>) -> Self {
        let mut reply = Message::new(message_type, sender, request.sender.clone());
        reply.correlation_id = Some(request.correlation_id.unwrap_or(request.id));
        reply.parent_message_id = Some(request.id);
        reply
    }

    pub fn is_broadcast(&self) -> bool {
        self.recipient == crate::BROADCAST_RECIPIENT
    }
}
