pub mod message;
pub mod plan;
pub mod reminder;
pub mod task;

pub use message::{Message, MessageStatus, MessageType};
pub use plan::{ExecutionPlan, ExecutionResult, PlanStep, VerificationResult};
pub use reminder::{Reminder, ReminderPriority};
pub use task::{ExecutionTrace, StepSummary, TaskDefinition, TaskStatus, TraceError};

pub const BROADCAST_RECIPIENT: &str = "broadcast";
