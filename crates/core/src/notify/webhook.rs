use crate::error::MonitorError;
use crate::notify::{Channel, Notifier};
use anyhow::Context;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
}

/// Posts `{subject, body}` as JSON to a configured URL (Slack-style relays, mail gateways...).
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook http client")?;

        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    fn channel(&self) -> Channel {
        Channel::Webhook
    }

    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        let res = self
            .http
            .post(&self.url)
            .json(&WebhookPayload { subject, body })
            .send()
            .await
            .map_err(|e| MonitorError::transient("notify", e))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(MonitorError::transient("notify", format!("HTTP {status}: {text}")).into());
        }

        tracing::info!(subject, "notification delivered");
        Ok(())
    }
}
