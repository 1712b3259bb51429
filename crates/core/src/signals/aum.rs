use crate::config::AumThresholds;
use crate::domain::finding::{Finding, FindingKind};

fn millions(v: f64) -> f64 {
    v / 1_000_000.0
}

/// AUM floor (level-triggered) and milestone (edge-triggered) checks for one AUM observation.
///
/// An absent previous snapshot counts as zero, so the first observation above the milestone fires.
pub fn evaluate_aum(
    ticker: &str,
    aum: f64,
    previous: Option<f64>,
    thresholds: Option<&AumThresholds>,
) -> Vec<Finding> {
    let mut out = Vec::new();
    let Some(thresholds) = thresholds else {
        return out;
    };

    if let Some(min_aum) = thresholds.min_aum.filter(|v| *v > 0.0) {
        if aum < min_aum {
            out.push(Finding::new(
                ticker,
                FindingKind::AumBelowFloor,
                format!(
                    "{ticker}: AUM below configured floor (${:.1}M): Current ${:.1}M.",
                    millions(min_aum),
                    millions(aum)
                ),
            ));
        }
    }

    if let Some(max_aum) = thresholds.max_aum.filter(|v| *v > 0.0) {
        if previous.unwrap_or(0.0) < max_aum && aum > max_aum {
            out.push(Finding::new(
                ticker,
                FindingKind::AumMilestone,
                format!(
                    "{ticker}: AUM milestone exceeded ${:.1}M! Current ${:.1}M.",
                    millions(max_aum),
                    millions(aum)
                ),
            ));
        }
    }

    out
}
