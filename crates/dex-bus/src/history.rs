use dex_types::{Message, MessageType};
use std::collections::VecDeque;

/// Optional filters for [`super::MessageBus::get_history`].
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub message_type: Option<MessageType>,
}

impl HistoryFilter {
    fn matches(&self, message: &Message) -> bool {
        if let Some(sender) = &self.sender {
            if &message.sender != sender {
                return false;
            }
        }
        if let Some(recipient) = &self.recipient {
            if &message.recipient != recipient {
                return false;
            }
        }
        if let Some(message_type) = self.message_type {
            if message.message_type != message_type {
                return false;
            }
        }
        true
    }
}

/// Bounded ring buffer of published messages, oldest evicted first.
pub(crate) struct History {
    capacity: usize,
    entries: VecDeque<Message>,
}

impl History {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub(crate) fn push(&mut self, message: Message) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    /// Newest-first, filtered, capped to `limit`.
    pub(crate) fn query(&self, filter: HistoryFilter, limit: usize) -> Vec<Message> {
        self.entries
            .iter()
            .rev()
            .filter(|m| filter.matches(m))
            .take(limit)
            .cloned()
            .collect()
    }
}
