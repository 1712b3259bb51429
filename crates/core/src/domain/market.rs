use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed market quote. Appended once per cycle per ticker, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(deserialize_with = "crate::domain::timestamp::deserialize")]
    pub date: DateTime<Utc>,
    pub price: f64,
    #[serde(default)]
    pub volume: f64,
    /// Provider that produced the quote.
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavPoint {
    #[serde(deserialize_with = "crate::domain::timestamp::deserialize")]
    pub date: DateTime<Utc>,
    pub nav: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AumSnapshot {
    pub aum: f64,
    #[serde(deserialize_with = "crate::domain::timestamp::deserialize")]
    pub date: DateTime<Utc>,
}

/// Latest AUM snapshot plus the single prior one kept for edge-triggered comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AumRecord {
    pub current: AumSnapshot,
    #[serde(default)]
    pub previous: Option<AumSnapshot>,
}

/// A held lot. Supplied externally; the monitor only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub ticker: String,
    pub shares: f64,
    pub buy_nav: f64,
}

impl PortfolioPosition {
    pub fn cost_basis(&self) -> f64 {
        self.shares * self.buy_nav
    }

    /// Unrealized gain as a fraction of cost, or `None` for a zero cost basis.
    pub fn gain_at(&self, price: f64) -> Option<f64> {
        if self.buy_nav <= 0.0 {
            return None;
        }
        Some((price - self.buy_nav) / self.buy_nav)
    }
}

/// Latest traded price and volume. The observation time is the cycle's, not the provider's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub volume: f64,
}

/// Fund-level figures from one profile lookup. Each may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub nav: Option<f64>,
    pub aum: Option<f64>,
    /// Distribution yield as a fraction.
    pub distribution_yield: Option<f64>,
}
