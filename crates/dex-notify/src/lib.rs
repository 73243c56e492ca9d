//! Notification transports. Each implements `send`/`is_configured`; an
//! unconfigured transport returns `false` from `send` without attempting
//! any I/O, which the reminder monitor treats identically to a failed send.

mod desktop;
mod smtp;
mod webhook;
mod whatsapp;

use async_trait::async_trait;
use dex_config::NotifyConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use desktop::DesktopNotifier;
pub use smtp::SmtpNotifier;
pub use webhook::WebhookNotifier;
pub use whatsapp::WhatsAppNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub tag: Option<String>,
    pub action_url: Option<String>,
}

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_configured(&self) -> bool;
    async fn send(&self, notification: &Notification) -> bool;
}

/// All transports configured for this process, built once from
/// [`dex_config::DexConfig`].
pub struct NotifierSet {
    transports: Vec<Arc<dyn NotificationTransport>>,
}

impl NotifierSet {
    pub fn from_config(config: &NotifyConfig) -> Self {
        let transports: Vec<Arc<dyn NotificationTransport>> = vec![
            Arc::new(DesktopNotifier),
            Arc::new(SmtpNotifier::new(config.smtp.clone())),
            Arc::new(WhatsAppNotifier::new(config.whatsapp.clone(), config.user_whatsapp_number.clone())),
            Arc::new(WebhookNotifier::new(config.webhook_url.clone())),
        ];
        Self { transports }
    }

    pub fn transports(&self) -> &[Arc<dyn NotificationTransport>] {
        &self.transports
    }

    /// Dispatches to every configured transport concurrently and reports
    /// whether at least one succeeded.
    pub async fn notify_all(&self, notification: &Notification) -> bool {
        let configured: Vec<_> = self.transports.iter().filter(|t| t.is_configured()).collect();
        if configured.is_empty() {
            return false;
        }
        let futures = configured.into_iter().map(|t| {
            let notification = notification.clone();
            async move { t.send(&notification).await }
        });
        let results = futures::future::join_all(futures).await;
        results.into_iter().any(|ok| ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_transports_yield_no_success() {
        let config = NotifyConfig { smtp: None, whatsapp: None, user_whatsapp_number: None, webhook_url: None };
        let set = NotifierSet::from_config(&config);
        let notification = Notification {
            title: "test".into(),
            message: "test".into(),
            priority: NotificationPriority::Normal,
            tag: None,
            action_url: None,
        };
        // Desktop is always "configured" but best-effort; the others aren't.
        let configured_count = set.transports().iter().filter(|t| t.is_configured()).count();
        assert_eq!(configured_count, 1);
        let _ = set.notify_all(&notification).await;
    }
}
