use dex_types::Message;
use std::collections::HashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Pending `request_response` callers, keyed by correlation id. Each
/// correlation id satisfies at most one waiter: `take` removes the entry.
pub(crate) struct Waiters {
    pending: HashMap<Uuid, oneshot::Sender<Message>>,
}

impl Waiters {
    pub(crate) fn new() -> Self {
        Self { pending: HashMap::new() }
    }

    pub(crate) fn register(&mut self, correlation_id: Uuid) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id, tx);
        rx
    }

    pub(crate) fn take(&mut self, correlation_id: Uuid) -> Option<oneshot::Sender<Message>> {
        self.pending.remove(&correlation_id)
    }

    /// Drops every pending sender; awaiting receivers observe a closed
    /// channel, which callers surface as `BusError::ShuttingDown`.
    pub(crate) fn fail_all(&mut self) {
        self.pending.clear();
    }
}
