use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossSeverity {
    Warning,
    Danger,
    Critical,
}

impl LossSeverity {
    pub fn label(self) -> &'static str {
        match self {
            LossSeverity::Warning => "Warning",
            LossSeverity::Danger => "Danger",
            LossSeverity::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Premium,
    Discount,
    VolumeCollapse,
    NavDecay,
    NavErosion,
    NavMarketInversion,
    PrincipalLoss(LossSeverity),
    AumBelowFloor,
    AumMilestone,
}

/// One risk finding, independently appendable to an alert body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub ticker: String,
    pub kind: FindingKind,
    pub message: String,
}

impl Finding {
    pub fn new(ticker: &str, kind: FindingKind, message: String) -> Self {
        Self {
            ticker: ticker.to_string(),
            kind,
            message,
        }
    }
}
