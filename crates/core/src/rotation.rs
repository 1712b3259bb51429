//! Trim sizing and reinvestment-target ranking.
//!
//! Both halves are pure; the worker's trim job wires them to the store, the dedup gate and the
//! notifier, and is the only place a trim cooldown gets written.

use crate::config::{RotationSettings, TrimSettings};
use crate::domain::market::PortfolioPosition;
use crate::storage::JsonStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrimPlan {
    pub ticker: String,
    pub gain: f64,
    pub trim_fraction: f64,
    /// Whole shares.
    pub shares_to_trim: f64,
    pub price: f64,
    pub buy_nav: f64,
}

impl TrimPlan {
    pub fn gross_proceeds(&self) -> f64 {
        self.shares_to_trim * self.price
    }

    pub fn realized_gain(&self) -> f64 {
        self.shares_to_trim * (self.price - self.buy_nav)
    }

    pub fn estimated_tax(&self, tax_rate: f64) -> f64 {
        self.realized_gain().max(0.0) * tax_rate
    }

    pub fn net_proceeds(&self, tax_rate: f64) -> f64 {
        self.gross_proceeds() - self.estimated_tax(tax_rate)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrimDecision {
    Plan(TrimPlan),
    /// Gain below the floor, or the position too small to trim a whole share.
    NoTrim,
    CoolingDown {
        last_trim: DateTime<Utc>,
        ready_at: DateTime<Utc>,
    },
}

/// Fraction of the position to trim for a given gain: the highest tier whose threshold the gain
/// reaches, or `None` below the floor.
pub fn trim_fraction(gain: f64, settings: &TrimSettings) -> Option<f64> {
    if gain < settings.min_gain {
        return None;
    }
    settings
        .tiers
        .iter()
        .rev()
        .find(|tier| gain >= tier.min_gain)
        .map(|tier| tier.fraction)
}

/// Gain-based sizing only; ignores cooldown.
pub fn size_trim(
    position: &PortfolioPosition,
    current_price: f64,
    settings: &TrimSettings,
) -> Option<TrimPlan> {
    let gain = position.gain_at(current_price)?;
    let fraction = trim_fraction(gain, settings)?;
    let shares_to_trim = (position.shares * fraction).floor();
    if shares_to_trim < 1.0 {
        return None;
    }

    Some(TrimPlan {
        ticker: position.ticker.clone(),
        gain,
        trim_fraction: fraction,
        shares_to_trim,
        price: current_price,
        buy_nav: position.buy_nav,
    })
}

pub fn should_trim(
    position: &PortfolioPosition,
    current_price: f64,
    last_trim: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    settings: &TrimSettings,
) -> TrimDecision {
    let Some(plan) = size_trim(position, current_price, settings) else {
        return TrimDecision::NoTrim;
    };

    if let Some(last_trim) = last_trim {
        let ready_at = last_trim + Duration::days(settings.cooldown_days);
        if now < ready_at {
            return TrimDecision::CoolingDown {
                last_trim,
                ready_at,
            };
        }
    }

    TrimDecision::Plan(plan)
}

/// Inputs for scoring one potential reinvestment target.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMetrics {
    pub ticker: String,
    pub nav: f64,
    pub price: f64,
    /// Oldest price in the trailing window.
    pub window_start_price: f64,
    pub aum: Option<f64>,
    /// Fraction, e.g. `0.12` for 12%.
    pub distribution_yield: f64,
}

impl CandidateMetrics {
    /// Builds metrics from persisted history. `None` unless NAV, yield and a full price window are
    /// all available.
    pub fn from_store(
        store: &JsonStore,
        ticker: &str,
        distribution_yield: Option<f64>,
        window: usize,
    ) -> Option<Self> {
        let distribution_yield = distribution_yield?;
        let nav = store.latest_nav(ticker)?.nav;
        let prices = store.last_prices(ticker, window);
        if prices.len() < window {
            return None;
        }
        let window_start_price = prices.first()?.price;
        let price = prices.last()?.price;
        if nav <= 0.0 || window_start_price <= 0.0 {
            return None;
        }

        Some(Self {
            ticker: ticker.to_string(),
            nav,
            price,
            window_start_price,
            aum: store.snapshot_aum(ticker).map(|s| s.aum),
            distribution_yield,
        })
    }

    pub fn discount_pct(&self) -> f64 {
        (self.nav - self.price) / self.nav * 100.0
    }

    pub fn nav_change_pct(&self) -> f64 {
        (self.price - self.window_start_price) / self.window_start_price * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotationCandidate {
    pub ticker: String,
    pub score: f64,
    pub discount_pct: f64,
    pub nav_change_pct: f64,
    pub distribution_yield: f64,
    pub aum: f64,
}

/// Filters and scores every candidate other than `exclude_ticker`, best first.
///
/// Equal scores keep input order.
pub fn rank_rotation_targets(
    exclude_ticker: &str,
    candidates: &[CandidateMetrics],
    settings: &RotationSettings,
) -> Vec<RotationCandidate> {
    let mut ranked: Vec<RotationCandidate> = candidates
        .iter()
        .filter(|c| c.ticker != exclude_ticker)
        .filter_map(|c| {
            let aum = c.aum.filter(|aum| *aum >= settings.min_aum)?;
            let nav_change_pct = c.nav_change_pct();
            if nav_change_pct < -settings.max_nav_decline_pct {
                return None;
            }
            if c.distribution_yield < settings.min_yield {
                return None;
            }

            let discount_pct = c.discount_pct();
            let score = c.distribution_yield * 100.0 + discount_pct - nav_change_pct.abs() / 2.0;
            Some(RotationCandidate {
                ticker: c.ticker.clone(),
                score,
                discount_pct,
                nav_change_pct,
                distribution_yield: c.distribution_yield,
                aum,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(settings.max_candidates);
    ranked
}

/// Even split of after-tax proceeds across the ranked targets.
pub fn allocation_per_candidate(net_proceeds: f64, candidates: usize) -> Option<f64> {
    (candidates > 0).then(|| net_proceeds / candidates as f64)
}

pub fn trim_alert_subject(plan: &TrimPlan) -> String {
    format!("ETF Trim Recommendation: {}", plan.ticker)
}

pub fn compose_trim_alert(plan: &TrimPlan, targets: &[RotationCandidate], tax_rate: f64) -> String {
    let net = plan.net_proceeds(tax_rate);
    let mut body = String::new();

    let _ = writeln!(
        body,
        "TRIM RECOMMENDATION: {} is up {:.2}% over cost (buy NAV ${:.2}, now ${:.2}).",
        plan.ticker,
        plan.gain * 100.0,
        plan.buy_nav,
        plan.price
    );
    let _ = writeln!(
        body,
        "Suggested trim: {:.0} shares ({:.0}% of position), about ${:.2} gross.",
        plan.shares_to_trim,
        plan.trim_fraction * 100.0,
        plan.gross_proceeds()
    );
    let _ = write!(
        body,
        "Estimated capital-gains tax at {:.0}%: ${:.2}. After-tax proceeds: ${:.2}.",
        tax_rate * 100.0,
        plan.estimated_tax(tax_rate),
        net
    );

    match allocation_per_candidate(net, targets.len()) {
        Some(each) => {
            let _ = write!(body, "\n\nRotation targets (${each:.2} each):");
            for (i, t) in targets.iter().enumerate() {
                let _ = write!(
                    body,
                    "\n{}. {}: score {:.2} | yield {:.2}% | discount {:.2}% | price change {:.2}%",
                    i + 1,
                    t.ticker,
                    t.score,
                    t.distribution_yield * 100.0,
                    t.discount_pct,
                    t.nav_change_pct
                );
            }
        }
        None => {
            body.push_str("\n\nNo rotation target passed the filters; hold proceeds as cash.");
        }
    }

    body
}
