use crate::notifier::NotificationSink;
use crate::ListenerError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Environment variable holding the webhook URL.
pub const WEBHOOK_ENV: &str = "SLACK_WEBHOOK";

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts alert text as `{"text": ...}` to an incoming-webhook URL
/// (Slack-compatible).
#[derive(Clone)]
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: impl ToString) -> Result<Self, ListenerError> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(concat!("bgp-listener/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    /// Creates a sink from the `SLACK_WEBHOOK` environment variable, also
    /// looking at a `.env` file.
    pub fn from_env() -> Result<Self, ListenerError> {
        Self::new(webhook_url_from_env()?)
    }
}

/// Reads the webhook URL from the environment. A missing URL is a fatal
/// configuration error.
pub fn webhook_url_from_env() -> Result<String, ListenerError> {
    dotenvy::dotenv().ok();
    match dotenvy::var(WEBHOOK_ENV) {
        Ok(url) if !url.trim().is_empty() => Ok(url.trim().to_string()),
        _ => Err(ListenerError::ConfigError(format!(
            "{} environment variable is not set",
            WEBHOOK_ENV
        ))),
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, text: &str, timeout: Duration) -> Result<(), ListenerError> {
        let response = self
            .client
            .post(self.url.as_str())
            .json(&WebhookPayload { text })
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("webhook accepted notification with status {}", status);
            Ok(())
        } else {
            Err(ListenerError::DeliveryError(format!(
                "webhook returned status {}",
                status
            )))
        }
    }
}
