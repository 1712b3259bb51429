//! Read-only views over the persisted state for the dashboard.

use crate::domain::market::{NavPoint, PortfolioPosition};
use crate::signals::EROSION_WINDOW;
use crate::storage::JsonStore;
use serde::Serialize;

const HEALTHY_GAIN_PCT: f64 = 15.0;
const MONITOR_GAIN_PCT: f64 = 5.0;
const AUM_RISK_REFERENCE: f64 = 50_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionHealth {
    Healthy,
    Monitor,
    HighRisk,
}

impl PositionHealth {
    pub fn classify(gain_pct: f64) -> Self {
        if gain_pct > HEALTHY_GAIN_PCT {
            PositionHealth::Healthy
        } else if gain_pct > MONITOR_GAIN_PCT {
            PositionHealth::Monitor
        } else {
            PositionHealth::HighRisk
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionReport {
    pub ticker: String,
    pub shares: f64,
    pub buy_nav: f64,
    pub current_price: f64,
    pub initial_value: f64,
    pub current_value: f64,
    pub gain_pct: f64,
    pub health: PositionHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    pub positions: Vec<PositionReport>,
    pub total_initial_value: f64,
    pub total_current_value: f64,
    pub total_gain_pct: Option<f64>,
    pub health: Option<PositionHealth>,
}

fn position_report(position: &PortfolioPosition, current_price: f64) -> Option<PositionReport> {
    let gain_pct = position.gain_at(current_price)? * 100.0;
    Some(PositionReport {
        ticker: position.ticker.clone(),
        shares: position.shares,
        buy_nav: position.buy_nav,
        current_price,
        initial_value: position.cost_basis(),
        current_value: position.shares * current_price,
        gain_pct,
        health: PositionHealth::classify(gain_pct),
    })
}

/// Positions priced at their latest stored market price. Positions without a stored price are
/// left out of the totals.
pub fn portfolio_report(store: &JsonStore) -> PortfolioReport {
    let positions: Vec<PositionReport> = store
        .portfolio()
        .iter()
        .filter_map(|p| {
            let price = store.latest_price(&p.ticker)?.price;
            position_report(p, price)
        })
        .collect();

    let total_initial_value: f64 = positions.iter().map(|p| p.initial_value).sum();
    let total_current_value: f64 = positions.iter().map(|p| p.current_value).sum();
    let total_gain_pct = (total_initial_value > 0.0)
        .then(|| (total_current_value - total_initial_value) / total_initial_value * 100.0);

    PortfolioReport {
        positions,
        total_initial_value,
        total_current_value,
        total_gain_pct,
        health: total_gain_pct.map(PositionHealth::classify),
    }
}

/// Share of consecutive NAV drops across the last five points, 0..=1. Zero on short history.
pub fn nav_stability_score(navs: &[NavPoint]) -> f64 {
    if navs.len() < EROSION_WINDOW {
        return 0.0;
    }
    let window = &navs[navs.len() - EROSION_WINDOW..];
    let drops = window.windows(2).filter(|w| w[0].nav > w[1].nav).count();
    drops as f64 / (EROSION_WINDOW - 1) as f64
}

/// 1 for a missing or tiny fund, falling linearly to 0 at $50M.
pub fn aum_risk_score(aum: Option<f64>) -> f64 {
    match aum {
        None => 1.0,
        Some(aum) => (1.0 - aum / AUM_RISK_REFERENCE).clamp(0.0, 1.0),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TickerRisk {
    pub ticker: String,
    pub latest_price: Option<f64>,
    pub latest_nav: Option<f64>,
    pub premium_discount_pct: Option<f64>,
    pub aum: Option<f64>,
    pub nav_stability: f64,
    pub aum_risk: f64,
}

pub fn ticker_risk(store: &JsonStore, ticker: &str) -> TickerRisk {
    let latest_price = store.latest_price(ticker).map(|p| p.price);
    let navs = store.last_navs(ticker, EROSION_WINDOW);
    let latest_nav = navs.last().map(|n| n.nav);
    let aum = store.snapshot_aum(ticker).map(|s| s.aum);

    let premium_discount_pct = match (latest_price, latest_nav) {
        (Some(price), Some(nav)) if nav > 0.0 => Some((price - nav) / nav * 100.0),
        _ => None,
    };

    TickerRisk {
        ticker: ticker.to_string(),
        latest_price,
        latest_nav,
        premium_discount_pct,
        aum,
        nav_stability: nav_stability_score(&navs),
        aum_risk: aum_risk_score(aum),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::PricePoint;
    use crate::signals::fixtures::navs;
    use crate::storage::testing::TempStore;
    use chrono::Utc;

    #[test]
    fn classifies_by_gain_band() {
        assert_eq!(PositionHealth::classify(20.0), PositionHealth::Healthy);
        assert_eq!(PositionHealth::classify(15.0), PositionHealth::Monitor);
        assert_eq!(PositionHealth::classify(5.5), PositionHealth::Monitor);
        assert_eq!(PositionHealth::classify(5.0), PositionHealth::HighRisk);
        assert_eq!(PositionHealth::classify(-3.0), PositionHealth::HighRisk);
    }

    #[test]
    fn stability_score_counts_drops() {
        assert_eq!(nav_stability_score(&navs(&[5.0, 4.0, 3.0])), 0.0);
        assert_eq!(nav_stability_score(&navs(&[5.0, 4.0, 3.0, 2.0, 1.0])), 1.0);
        assert_eq!(nav_stability_score(&navs(&[5.0, 6.0, 5.0, 6.0, 5.0])), 0.5);
    }

    #[test]
    fn aum_risk_is_clamped() {
        assert_eq!(aum_risk_score(None), 1.0);
        assert_eq!(aum_risk_score(Some(25_000_000.0)), 0.5);
        assert_eq!(aum_risk_score(Some(500_000_000.0)), 0.0);
    }

    #[test]
    fn portfolio_report_uses_latest_stored_price() {
        let store = TempStore::new();
        store
            .replace_portfolio(&[
                PortfolioPosition {
                    ticker: "YMAX".to_string(),
                    shares: 10.0,
                    buy_nav: 10.0,
                },
                PortfolioPosition {
                    ticker: "UNPRICED".to_string(),
                    shares: 10.0,
                    buy_nav: 10.0,
                },
            ])
            .unwrap();
        for price in [11.0, 12.0] {
            store
                .append_price(
                    "YMAX",
                    PricePoint {
                        date: Utc::now(),
                        price,
                        volume: 1.0,
                        source: "test".to_string(),
                    },
                )
                .unwrap();
        }

        let report = portfolio_report(&store);
        assert_eq!(report.positions.len(), 1);
        assert_eq!(report.positions[0].current_price, 12.0);
        assert_eq!(report.positions[0].health, PositionHealth::Healthy);
        assert_eq!(report.total_initial_value, 100.0);
        assert_eq!(report.total_current_value, 120.0);
        assert_eq!(report.health, Some(PositionHealth::Healthy));
    }
}
