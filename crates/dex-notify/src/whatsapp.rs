use crate::{Notification, NotificationTransport};
use async_trait::async_trait;
use dex_config::TwilioConfig;

/// WhatsApp delivery via Twilio's messaging API.
pub struct WhatsAppNotifier {
    config: Option<TwilioConfig>,
    to_number: Option<String>,
    client: reqwest::Client,
}

impl WhatsAppNotifier {
    pub fn new(config: Option<TwilioConfig>, to_number: Option<String>) -> Self {
        Self { config, to_number, client: reqwest::Client::new() }
    }
}

#[async_trait]
impl NotificationTransport for WhatsAppNotifier {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    fn is_configured(&self) -> bool {
        self.config.is_some() && self.to_number.is_some()
    }

    async fn send(&self, notification: &Notification) -> bool {
        let (Some(config), Some(to_number)) = (&self.config, &self.to_number) else { return false };
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            config.account_sid
        );
        let body = format!("{}\n{}", notification.title, notification.message);
        let result = self
            .client
            .post(url)
            .basic_auth(&config.account_sid, Some(&config.auth_token))
            .form(&[
                ("From", format!("whatsapp:{}", config.from_number)),
                ("To", format!("whatsapp:{to_number}")),
                ("Body", body),
            ])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "twilio rejected whatsapp message");
                false
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to reach twilio");
                false
            }
        }
    }
}
