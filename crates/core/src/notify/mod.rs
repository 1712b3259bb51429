pub mod heartbeat;
pub mod webhook;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Webhook,
    Log,
}

/// Outbound notification transport. A failed send is logged by the caller and never retried
/// within the same cycle.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Writes notifications to the log only. Used for dry runs and when no transport is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn channel(&self) -> Channel {
        Channel::Log
    }

    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(subject, body_len = body.len(), "notification (log only)\n{body}");
        Ok(())
    }
}
