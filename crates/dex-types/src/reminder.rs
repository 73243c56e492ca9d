use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderPriority {
    Low,
    Normal,
    High,
}

impl Default for ReminderPriority {
    fn default() -> Self {
        ReminderPriority::Normal
    }
}

/// A durable reminder. `is_active` is owned by the reminder monitor once
/// the reminder has been persisted: nothing else flips it back to `false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub message: String,
    pub scheduled_time: DateTime<Utc>,
    #[serde(default)]
    pub priority: ReminderPriority,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Reminder {
    pub fn new(message: impl Into<String>, scheduled_time: DateTime<Utc>, priority: ReminderPriority) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            scheduled_time,
            priority,
            created_at: Utc::now(),
            is_active: true,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.scheduled_time <= now
    }
}
