//! Stateless risk rules. Each rule sees the same [`Observation`] and yields at most one finding;
//! rules never short-circuit one another.

mod aum;
mod rules;

pub use aum::evaluate_aum;
pub use rules::{
    nav_decay, nav_erosion, nav_market_inversion, premium_discount, principal_loss,
    volume_collapse,
};

use crate::config::MonitorConfig;
use crate::domain::finding::Finding;
use crate::domain::market::{NavPoint, PortfolioPosition};

/// Number of NAV points the erosion rule inspects.
pub const EROSION_WINDOW: usize = 5;
/// Trailing observations averaged for the volume and decay baselines.
pub const AVERAGE_WINDOW: usize = 30;

/// Everything a rule may look at for one ticker in one cycle.
#[derive(Debug, Clone)]
pub struct Observation<'a> {
    pub ticker: &'a str,
    pub price: f64,
    pub volume: f64,
    /// Absent NAV disables NAV-dependent rules for this cycle.
    pub nav: Option<f64>,
    pub avg_volume: Option<f64>,
    /// Trailing average of the configured decay reference series.
    pub decay_baseline: Option<f64>,
    /// Most recent NAV points, oldest first, including the current one.
    pub recent_navs: &'a [NavPoint],
    pub position: Option<&'a PortfolioPosition>,
}

pub type Rule = fn(&Observation<'_>, &MonitorConfig) -> Option<Finding>;

pub const PRICE_RULES: &[Rule] = &[
    premium_discount,
    volume_collapse,
    nav_decay,
    nav_erosion,
    nav_market_inversion,
    principal_loss,
];

pub fn evaluate(obs: &Observation<'_>, config: &MonitorConfig) -> Vec<Finding> {
    PRICE_RULES
        .iter()
        .filter_map(|rule| rule(obs, config))
        .collect()
}

/// Arithmetic mean, or `None` for an empty input.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}
