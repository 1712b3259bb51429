mod monitor;

pub use monitor::{
    AumThresholds, DecayReference, MonitorConfig, PrincipalLossThresholds, RiskThresholds,
    RotationSettings, ScheduleSettings, TrimSettings, TrimTier,
};

use crate::error::MonitorError;

const DEFAULT_MONITOR_CONFIG_PATH: &str = "monitor.json";
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone)]
pub struct Settings {
    pub monitor_config_path: String,
    pub data_dir: String,
    pub sentry_dsn: Option<String>,
    pub polygon_api_key: Option<String>,
    pub polygon_base_url: Option<String>,
    pub fund_data_base_url: Option<String>,
    pub fund_data_api_key: Option<String>,
    pub notify_webhook_url: Option<String>,
    pub heartbeat_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            monitor_config_path: std::env::var("MONITOR_CONFIG_PATH")
                .unwrap_or_else(|_| DEFAULT_MONITOR_CONFIG_PATH.to_string()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
            sentry_dsn: non_empty_var("SENTRY_DSN"),
            polygon_api_key: non_empty_var("POLYGON_API_KEY"),
            polygon_base_url: non_empty_var("POLYGON_BASE_URL"),
            fund_data_base_url: non_empty_var("FUND_DATA_BASE_URL"),
            fund_data_api_key: non_empty_var("FUND_DATA_API_KEY"),
            notify_webhook_url: non_empty_var("NOTIFY_WEBHOOK_URL"),
            heartbeat_url: non_empty_var("HEARTBEAT_URL"),
        })
    }

    pub fn require_polygon_api_key(&self) -> anyhow::Result<&str> {
        require(self.polygon_api_key.as_deref(), "POLYGON_API_KEY")
    }

    pub fn require_fund_data_base_url(&self) -> anyhow::Result<&str> {
        require(self.fund_data_base_url.as_deref(), "FUND_DATA_BASE_URL")
    }

    /// Loads and validates the monitor configuration file named by `MONITOR_CONFIG_PATH`.
    pub fn load_monitor_config(&self) -> anyhow::Result<MonitorConfig> {
        MonitorConfig::load(&self.monitor_config_path)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn require<'a>(value: Option<&'a str>, key: &str) -> anyhow::Result<&'a str> {
    value.ok_or_else(|| MonitorError::Configuration(format!("{key} is required")).into())
}
