//! Message bus mediating the planner/executor/verifier pipeline.
//!
//! Planner, executor and verifier never hold references to each other; the
//! bus is the only edge in that graph. Each agent subscribes to the message
//! types it handles and publishes replies back onto the bus.

mod history;
mod waiters;

use async_trait::async_trait;
use dex_types::{Message, MessageStatus, MessageType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

pub use history::HistoryFilter;
use history::History;
use waiters::Waiters;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("bus is shutting down")]
    ShuttingDown,
}

/// Handler invoked for every message delivered to a subscribed type.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message);
}

#[async_trait]
impl<F> MessageHandler for F
where
    F: Fn(Message) -> futures_util::future::BoxFuture<'static, ()> + Send + Sync,
{
    async fn handle(&self, message: Message) {
        (self)(message).await
    }
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Maximum number of messages retained in `get_history`.
    pub history_limit: usize,
    pub default_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_limit: 1000,
            default_timeout: Duration::from_secs(30),
        }
    }
}

type Subscriber = (Uuid, Arc<dyn MessageHandler>);

struct Inner {
    subscribers: HashMap<MessageType, Vec<Subscriber>>,
    broadcast_subscribers: Vec<Subscriber>,
    history: History,
    waiters: Waiters,
    shutting_down: bool,
}

/// In-process publish/subscribe bus with request/response correlation.
///
/// Cloning a `MessageBus` clones a handle; all handles share the same
/// subscriber table, history ring and waiter map.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<Mutex<Inner>>,
    config: BusConfig,
}

impl MessageBus {
    pub fn new(config: BusConfig) -> Self {
        let history = History::new(config.history_limit);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                subscribers: HashMap::new(),
                broadcast_subscribers: Vec::new(),
                history,
                waiters: Waiters::new(),
                shutting_down: false,
            })),
            config,
        }
    }

    /// Register a handler for a message type. Returns a subscription id
    /// usable with [`unsubscribe`](Self::unsubscribe).
    pub async fn subscribe(&self, message_type: MessageType, handler: Arc<dyn MessageHandler>) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        inner.subscribers.entry(message_type).or_default().push((id, handler));
        id
    }

    /// Register a handler that receives every message addressed to the
    /// literal `broadcast` recipient, regardless of type.
    pub async fn subscribe_broadcast(&self, handler: Arc<dyn MessageHandler>) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        inner.broadcast_subscribers.push((id, handler));
        id
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        let mut inner = self.inner.lock().await;
        for subs in inner.subscribers.values_mut() {
            subs.retain(|(sid, _)| *sid != id);
        }
        inner.broadcast_subscribers.retain(|(sid, _)| *sid != id);
    }

    /// Publish a message: stamps send metadata, records history, routes to
    /// subscribers, and resolves any pending `request_response` waiter whose
    /// correlation id matches.
    pub async fn publish(&self, mut message: Message) -> Message {
        message.status = MessageStatus::Sent;
        message.sent_at = Some(chrono::Utc::now());

        let (type_handlers, broadcast_handlers, waiter) = {
            let mut inner = self.inner.lock().await;
            inner.history.push(message.clone());
            let type_handlers = inner
                .subscribers
                .get(&message.message_type)
                .cloned()
                .unwrap_or_default();
            let broadcast_handlers = if message.is_broadcast() {
                inner.broadcast_subscribers.clone()
            } else {
                Vec::new()
            };
            // A message can never resolve a waiter registered under its own
            // id: `request_response` stamps `correlation_id = id` on the
            // outgoing request itself, and publishing that same request
            // would otherwise hand the caller its own message back instead
            // of waiting for a reply. Real replies (`Message::reply_to`)
            // always mint a fresh `id` while carrying the original
            // `correlation_id` forward, so this only excludes the
            // originating request.
            let waiter = message
                .correlation_id
                .filter(|cid| *cid != message.id)
                .and_then(|cid| inner.waiters.take(cid));
            (type_handlers, broadcast_handlers, waiter)
        };

        let mut delivered = message.clone();
        delivered.status = MessageStatus::Delivered;
        delivered.delivered_at = Some(chrono::Utc::now());

        // Awaited in sequence, per handler, so two messages published in
        // order to the same handler are processed in that order. Handlers
        // that do slow work should offload it internally rather than block
        // the bus.
        for (_, handler) in type_handlers.into_iter().chain(broadcast_handlers) {
            handler.handle(delivered.clone()).await;
        }

        if let Some(sender) = waiter {
            let mut completed = delivered.clone();
            completed.status = MessageStatus::Completed;
            completed.completed_at = Some(chrono::Utc::now());
            // The receiver may already be gone (timed out); ignore.
            let _ = sender.send(completed);
        }

        message
    }

    /// Publish `message` and await the first message whose `correlation_id`
    /// matches, or a timeout. Registers the waiter before publishing so a
    /// synchronous handler cannot resolve it before we start waiting.
    pub async fn request_response(&self, mut message: Message, timeout: Duration) -> Result<Message, BusError> {
        let correlation_id = message.correlation_id.unwrap_or(message.id);
        message.correlation_id = Some(correlation_id);

        let receiver = {
            let mut inner = self.inner.lock().await;
            if inner.shutting_down {
                return Err(BusError::ShuttingDown);
            }
            inner.waiters.register(correlation_id)
        };

        self.publish(message).await;

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(msg)) => Ok(msg),
            Ok(Err(_recv_error)) => Err(BusError::ShuttingDown),
            Err(_elapsed) => {
                let mut inner = self.inner.lock().await;
                inner.waiters.take(correlation_id);
                Err(BusError::Timeout(timeout))
            }
        }
    }

    pub async fn get_history(&self, filter: HistoryFilter, limit: usize) -> Vec<Message> {
        let inner = self.inner.lock().await;
        inner.history.query(filter, limit)
    }

    /// Clears subscribers and fails every outstanding waiter. Idempotent.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.shutting_down = true;
        inner.subscribers.clear();
        inner.broadcast_subscribers.clear();
        inner.waiters.fail_all();
    }

    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dex_types::MessageType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl MessageHandler for CountingHandler {
        async fn handle(&self, _message: Message) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn subscribe_twice_invokes_handler_once_per_message() {
        let bus = MessageBus::new(BusConfig::default());
        let counter = Arc::new(AtomicUsize::new(0));
        let handler: Arc<dyn MessageHandler> = Arc::new(CountingHandler(counter.clone()));
        bus.subscribe(MessageType::Heartbeat, handler).await;

        bus.publish(Message::new(MessageType::Heartbeat, "a", "b")).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_capped() {
        let bus = MessageBus::new(BusConfig {
            history_limit: 2,
            ..BusConfig::default()
        });
        for _ in 0..3 {
            bus.publish(Message::new(MessageType::Heartbeat, "a", "broadcast")).await;
        }
        let hist = bus.get_history(HistoryFilter::default(), 10).await;
        assert_eq!(hist.len(), 2);
    }

    #[tokio::test]
    async fn request_response_times_out_without_responder() {
        let bus = MessageBus::new(BusConfig::default());
        let msg = Message::new(MessageType::PlanRequest, "submitter", "planner");
        let result = bus.request_response(msg, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(BusError::Timeout(_))));
    }

    #[tokio::test]
    async fn request_response_resolves_on_matching_correlation() {
        let bus = MessageBus::new(BusConfig::default());
        let bus_for_handler = bus.clone();
        bus.subscribe(
            MessageType::PlanRequest,
            Arc::new(move |msg: Message| {
                let bus = bus_for_handler.clone();
                Box::pin(async move {
                    let reply = Message::reply_to(MessageType::PlanResponse, &msg, "planner");
                    bus.publish(reply).await;
                }) as futures_util::future::BoxFuture<'static, ()>
            }),
        )
        .await;

        let msg = Message::new(MessageType::PlanRequest, "submitter", "planner");
        let result = bus.request_response(msg, Duration::from_secs(1)).await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap().message_type, MessageType::PlanResponse);
    }

    #[tokio::test]
    async fn shutdown_fails_pending_waiters() {
        let bus = MessageBus::new(BusConfig::default());
        let bus2 = bus.clone();
        let waiting = tokio::spawn(async move {
            let msg = Message::new(MessageType::PlanRequest, "submitter", "planner");
            bus2.request_response(msg, Duration::from_secs(5)).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.shutdown().await;
        let result = waiting.await.unwrap();
        assert!(matches!(result, Err(BusError::ShuttingDown)));
    }
}
