use crate::{Notification, NotificationTransport};
use async_trait::async_trait;
use serde_json::json;

/// Generic chat-platform incoming webhook (Slack/Discord-compatible
/// `{"text": "..."}` payload).
pub struct WebhookNotifier {
    url: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>) -> Self {
        Self { url, client: reqwest::Client::new() }
    }
}

#[async_trait]
impl NotificationTransport for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    async fn send(&self, notification: &Notification) -> bool {
        let Some(url) = &self.url else { return false };
        let payload = json!({ "text": format!("{}\n{}", notification.title, notification.message) });
        match self.client.post(url).json(&payload).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to post webhook notification");
                false
            }
        }
    }
}
