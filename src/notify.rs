//! Notification sink seam.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Opaque notification sink. `target` is a channel or user reference owned
/// by the deployment (for [`WebhookNotifier`], a webhook URL).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target: &str, text: &str) -> Result<()>;
}

/// Posts notifications as JSON `{"content": ...}` to the target webhook.
pub struct WebhookNotifier {
    http: Client,
}

impl WebhookNotifier {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build webhook client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, target: &str, text: &str) -> Result<()> {
        let response = self
            .http
            .post(target)
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await
            .context("failed to post notification")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "notification sink returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            ));
        }
        Ok(())
    }
}
