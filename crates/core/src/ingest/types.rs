use serde::{Deserialize, Serialize};

/// Polygon previous-day aggregate (`/v2/aggs/ticker/{ticker}/prev`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolygonPrevResponse {
    #[serde(default)]
    pub results: Vec<PolygonAggregate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolygonAggregate {
    /// Close price.
    pub c: f64,
    /// Volume.
    pub v: f64,
}

/// Fund profile served by the fund-data endpoint. Every field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundProfile {
    pub nav: Option<f64>,
    pub total_assets: Option<f64>,
    /// Trailing distribution yield as a fraction (0.12 = 12%).
    #[serde(rename = "yield")]
    pub distribution_yield: Option<f64>,
}

/// Treats missing, zero, negative and non-finite values alike.
pub fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite() && *x > 0.0)
}
