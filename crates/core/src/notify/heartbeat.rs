use anyhow::Context;
use std::time::Duration;

const HEARTBEAT_TIMEOUT_SECS: u64 = 5;

/// Liveness ping to an external monitor after a successful risk cycle.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    http: reqwest::Client,
    url: String,
}

impl Heartbeat {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HEARTBEAT_TIMEOUT_SECS))
            .build()
            .context("failed to build heartbeat http client")?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    /// Never fails: errors are logged and swallowed.
    pub async fn ping(&self) -> bool {
        match self.http.get(&self.url).send().await {
            Ok(res) if res.status().is_success() => {
                tracing::info!("heartbeat sent");
                true
            }
            Ok(res) => {
                tracing::warn!(status = %res.status(), "heartbeat rejected");
                false
            }
            Err(err) => {
                tracing::warn!(error = %err, "heartbeat send failed");
                false
            }
        }
    }
}
