//! Webhook event sink
//!
//! POSTs each batch as JSON:
//!
//! ```json
//! { "device": "win-01", "collected_at": "...", "events": [ { "eventClass": "/Status", ... } ] }
//! ```

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info, instrument};

use crate::config::Webhook;
use crate::events::EventBatch;

use super::EventSink;

#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    webhook: Webhook,
}

impl WebhookSink {
    pub fn new(webhook: Webhook) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(webhook.timeout))
            .build()
            .context("failed to build webhook HTTP client")?;

        Ok(Self { client, webhook })
    }
}

#[async_trait]
impl EventSink for WebhookSink {
    #[instrument(skip_all, fields(device = %batch.device, events = batch.len()))]
    async fn publish(&self, batch: EventBatch) -> anyhow::Result<()> {
        let mut request = self.client.post(&self.webhook.url).json(&batch);
        if let Some(token) = &self.webhook.token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                if response.status().is_success() {
                    info!("successfully sent event batch");
                    Ok(())
                } else {
                    error!("event webhook failed with status: {}", response.status());
                    anyhow::bail!("webhook returned {}", response.status())
                }
            }
            Err(e) => {
                error!("failed to send event batch: {e}");
                Err(e).context("failed to send event batch")
            }
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
