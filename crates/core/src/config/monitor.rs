use crate::error::MonitorError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Operator configuration loaded once at startup and passed by reference to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub watchlist: Vec<String>,
    pub risk_thresholds: RiskThresholds,
    pub principal_loss_thresholds: PrincipalLossThresholds,
    /// Per-ticker AUM floor and milestone. Tickers without an entry skip both checks.
    pub aum_thresholds: BTreeMap<String, AumThresholds>,
    pub alert_suppression_hours: i64,
    pub trim: TrimSettings,
    pub rotation: RotationSettings,
    pub schedule: ScheduleSettings,
    pub request_timeout_secs: u64,
    /// Overrides `HEARTBEAT_URL` when set.
    pub heartbeat_url: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            watchlist: Vec::new(),
            risk_thresholds: RiskThresholds::default(),
            principal_loss_thresholds: PrincipalLossThresholds::default(),
            aum_thresholds: BTreeMap::new(),
            alert_suppression_hours: 24,
            trim: TrimSettings::default(),
            rotation: RotationSettings::default(),
            schedule: ScheduleSettings::default(),
            request_timeout_secs: 5,
            heartbeat_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Fires when `|price - nav| / nav >= premium_discount_pct`.
    pub premium_discount_pct: f64,
    /// Fires when the drop below the trailing average volume is strictly greater than this.
    pub volume_drop_pct: f64,
    /// Fires when the drop below the trailing reference average is strictly greater than this.
    pub nav_decay_pct: f64,
    pub nav_decay_reference: DecayReference,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            premium_discount_pct: 0.03,
            volume_drop_pct: 0.5,
            nav_decay_pct: 0.10,
            nav_decay_reference: DecayReference::Price,
        }
    }
}

/// Series averaged to detect NAV decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayReference {
    /// Trailing market prices, used as a NAV proxy.
    Price,
    /// Trailing stored NAV observations.
    Nav,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrincipalLossThresholds {
    pub warning: f64,
    pub danger: f64,
    pub critical: f64,
}

impl Default for PrincipalLossThresholds {
    fn default() -> Self {
        Self {
            warning: 0.05,
            danger: 0.10,
            critical: 0.20,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AumThresholds {
    pub min_aum: Option<f64>,
    pub max_aum: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimTier {
    pub min_gain: f64,
    pub fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimSettings {
    /// No trim is proposed below this unrealized gain.
    pub min_gain: f64,
    /// Ascending by `min_gain`; the highest matching tier wins.
    pub tiers: Vec<TrimTier>,
    pub cooldown_days: i64,
    pub capital_gains_tax_rate: f64,
}

impl Default for TrimSettings {
    fn default() -> Self {
        Self {
            min_gain: 0.15,
            tiers: vec![
                TrimTier {
                    min_gain: 0.15,
                    fraction: 0.10,
                },
                TrimTier {
                    min_gain: 0.18,
                    fraction: 0.15,
                },
                TrimTier {
                    min_gain: 0.25,
                    fraction: 0.20,
                },
            ],
            cooldown_days: 30,
            capital_gains_tax_rate: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSettings {
    pub min_aum: f64,
    /// Percent. Candidates whose price moved below `-max_nav_decline_pct` over the window are dropped.
    pub max_nav_decline_pct: f64,
    /// Fraction, e.g. `0.05` for 5%.
    pub min_yield: f64,
    pub max_candidates: usize,
    pub price_window: usize,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            min_aum: 50_000_000.0,
            max_nav_decline_pct: 10.0,
            min_yield: 0.05,
            max_candidates: 3,
            price_window: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub risk_interval_secs: u64,
    pub trim_interval_secs: u64,
    /// Interval used for both jobs in fast development mode.
    pub dev_interval_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            risk_interval_secs: 3600,
            trim_interval_secs: 3600,
            dev_interval_secs: 60,
        }
    }
}

/// One year.
const MAX_SUPPRESSION_HOURS: i64 = 24 * 365;
/// Ten years.
const MAX_COOLDOWN_DAYS: i64 = 3650;

impl MonitorConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MonitorError::Configuration(format!("read {}: {e}", path.display())))?;
        let config = Self::from_json(&text)
            .with_context(|| format!("invalid monitor config at {}", path.display()))?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| MonitorError::Configuration(format!("parse monitor config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let fail = |msg: String| -> anyhow::Result<()> { Err(MonitorError::Configuration(msg).into()) };

        if self.watchlist.iter().all(|t| t.trim().is_empty()) {
            return fail("watchlist must contain at least one ticker".to_string());
        }

        let r = &self.risk_thresholds;
        for (name, v) in [
            ("premium_discount_pct", r.premium_discount_pct),
            ("volume_drop_pct", r.volume_drop_pct),
            ("nav_decay_pct", r.nav_decay_pct),
        ] {
            if !(v > 0.0) {
                return fail(format!("risk_thresholds.{name} must be > 0 (got {v})"));
            }
        }

        let p = &self.principal_loss_thresholds;
        if !(0.0 < p.warning && p.warning < p.danger && p.danger < p.critical) {
            return fail(format!(
                "principal_loss_thresholds must satisfy 0 < warning < danger < critical (got {} / {} / {})",
                p.warning, p.danger, p.critical
            ));
        }

        if !(1..=MAX_SUPPRESSION_HOURS).contains(&self.alert_suppression_hours) {
            return fail(format!(
                "alert_suppression_hours must be in 1..={MAX_SUPPRESSION_HOURS} (got {})",
                self.alert_suppression_hours
            ));
        }

        let t = &self.trim;
        if t.tiers.is_empty() {
            return fail("trim.tiers must be non-empty".to_string());
        }
        for pair in t.tiers.windows(2) {
            if !(pair[0].min_gain < pair[1].min_gain && pair[0].fraction <= pair[1].fraction) {
                return fail("trim.tiers must be ascending in min_gain and fraction".to_string());
            }
        }
        if t.tiers.iter().any(|tier| !(tier.fraction > 0.0 && tier.fraction <= 1.0)) {
            return fail("trim tier fractions must be in (0, 1]".to_string());
        }
        if !(0..=MAX_COOLDOWN_DAYS).contains(&t.cooldown_days) {
            return fail(format!(
                "trim.cooldown_days must be in 0..={MAX_COOLDOWN_DAYS} (got {})",
                t.cooldown_days
            ));
        }
        if !(0.0..1.0).contains(&t.capital_gains_tax_rate) {
            return fail(format!(
                "trim.capital_gains_tax_rate must be in [0, 1) (got {})",
                t.capital_gains_tax_rate
            ));
        }

        if self.rotation.price_window < 2 {
            return fail("rotation.price_window must be >= 2".to_string());
        }

        let s = &self.schedule;
        if s.risk_interval_secs == 0 || s.trim_interval_secs == 0 || s.dev_interval_secs == 0 {
            return fail("schedule intervals must be > 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return fail("request_timeout_secs must be > 0".to_string());
        }

        Ok(())
    }

    pub fn watchlist(&self) -> impl Iterator<Item = &str> {
        self.watchlist
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
    }

    pub fn suppression_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.alert_suppression_hours)
    }
}
