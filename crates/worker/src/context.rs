use etf_sentinel_core::alerts::DedupGate;
use etf_sentinel_core::config::MonitorConfig;
use etf_sentinel_core::ingest::MarketDataClient;
use etf_sentinel_core::notify::heartbeat::Heartbeat;
use etf_sentinel_core::notify::Notifier;
use etf_sentinel_core::storage::JsonStore;

/// Everything a job needs, built once at startup.
pub struct Monitor {
    pub config: MonitorConfig,
    pub store: JsonStore,
    pub market: Box<dyn MarketDataClient>,
    pub notifier: Box<dyn Notifier>,
    pub heartbeat: Option<Heartbeat>,
}

impl Monitor {
    pub fn gate(&self) -> DedupGate<'_> {
        DedupGate::new(&self.store, self.config.suppression_window())
    }
}

/// Logs a failed external lookup at a level matching how routine the failure is.
pub fn log_fetch_failure(ticker: &str, what: &'static str, err: &anyhow::Error) {
    if etf_sentinel_core::error::MonitorError::is_routine(err) {
        tracing::info!(ticker, what, error = %err, "data unavailable; skipping");
    } else {
        tracing::warn!(ticker, what, error = %err, "fetch failed; skipping");
    }
}
