use crate::{Notification, NotificationTransport};
use async_trait::async_trait;
use dex_config::SmtpConfig;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub struct SmtpNotifier {
    config: Option<SmtpConfig>,
}

impl SmtpNotifier {
    pub fn new(config: Option<SmtpConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NotificationTransport for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn send(&self, notification: &Notification) -> bool {
        let Some(config) = &self.config else { return false };

        let email = match Message::builder()
            .from(config.from.parse().unwrap_or_else(|_| "operator@localhost".parse().unwrap()))
            .to(config.from.parse().unwrap_or_else(|_| "operator@localhost".parse().unwrap()))
            .header(ContentType::TEXT_PLAIN)
            .subject(notification.title.clone())
            .body(notification.message.clone())
        {
            Ok(email) => email,
            Err(err) => {
                tracing::warn!(error = %err, "failed to build reminder email");
                return false;
            }
        };

        let creds = Credentials::new(config.from.clone(), config.password.clone());
        let transport = match AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server) {
            Ok(builder) => builder.port(config.port).credentials(creds).build(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to build smtp transport");
                return false;
            }
        };

        match transport.send(email).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(error = %err, "failed to send reminder email");
                false
            }
        }
    }
}
