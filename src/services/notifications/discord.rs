//! Discord webhook notifier

use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Delivery, Notifier, NotifyError};
use crate::config::DiscordConfig;
use crate::models::AlertMessage;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl DiscordNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self::with_client(webhook_url, reqwest::Client::new(), DEFAULT_TIMEOUT)
    }

    pub fn with_client(
        webhook_url: Option<String>,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            webhook_url: webhook_url.filter(|url| !url.trim().is_empty()),
            timeout,
        }
    }

    pub fn from_config(config: &DiscordConfig) -> Self {
        Self::with_client(
            config.target().map(str::to_string),
            reqwest::Client::new(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, alert: &AlertMessage) -> Result<Delivery, NotifyError> {
        let Some(url) = self.webhook_url.as_deref() else {
            warn!(
                symbol = %alert.instrument,
                "No Discord webhook configured, skipping notification"
            );
            return Ok(Delivery::Skipped);
        };

        let payload = json!({ "content": alert.payload_text() });

        debug!(symbol = %alert.instrument, "Posting alert to Discord");

        let resp = self
            .client
            .post(url)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        info!(symbol = %alert.instrument, "Discord notification sent for {}", alert.instrument);
        Ok(Delivery::Sent)
    }
}
