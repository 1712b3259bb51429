use super::{Observation, EROSION_WINDOW};
use crate::config::MonitorConfig;
use crate::domain::finding::{Finding, FindingKind, LossSeverity};

pub fn premium_discount(obs: &Observation<'_>, config: &MonitorConfig) -> Option<Finding> {
    let nav = obs.nav.filter(|n| *n > 0.0)?;
    let deviation = (obs.price - nav) / nav;
    if deviation.abs() < config.risk_thresholds.premium_discount_pct {
        return None;
    }

    let pct = deviation.abs() * 100.0;
    let finding = if deviation > 0.0 {
        Finding::new(
            obs.ticker,
            FindingKind::Premium,
            format!(
                "PREMIUM detected: {} trading {pct:.2}% above NAV.\n\
                 Recommendation: Investigate premium sustainability. Consider trimming exposure.",
                obs.ticker
            ),
        )
    } else {
        Finding::new(
            obs.ticker,
            FindingKind::Discount,
            format!(
                "DISCOUNT detected: {} trading {pct:.2}% below NAV.\n\
                 Recommendation: Discount could signal distress. Confirm fundamentals before buying.",
                obs.ticker
            ),
        )
    };
    Some(finding)
}

pub fn volume_collapse(obs: &Observation<'_>, config: &MonitorConfig) -> Option<Finding> {
    // A zero baseline means there is nothing to compare against.
    let avg = obs.avg_volume.filter(|v| *v > 0.0)?;
    let drop = (avg - obs.volume) / avg;
    if drop <= config.risk_thresholds.volume_drop_pct {
        return None;
    }

    Some(Finding::new(
        obs.ticker,
        FindingKind::VolumeCollapse,
        format!(
            "{}: Volume dropped {:.2}% below 30-observation average. Watch liquidity.",
            obs.ticker,
            drop * 100.0
        ),
    ))
}

pub fn nav_decay(obs: &Observation<'_>, config: &MonitorConfig) -> Option<Finding> {
    let nav = obs.nav?;
    let baseline = obs.decay_baseline.filter(|b| *b > 0.0)?;
    let decay = (baseline - nav) / baseline;
    if decay <= config.risk_thresholds.nav_decay_pct {
        return None;
    }

    Some(Finding::new(
        obs.ticker,
        FindingKind::NavDecay,
        format!(
            "{}: NAV has dropped {:.2}% below its 30-observation average (${nav:.2} vs ${baseline:.2}).",
            obs.ticker,
            decay * 100.0
        ),
    ))
}

pub fn nav_erosion(obs: &Observation<'_>, _config: &MonitorConfig) -> Option<Finding> {
    obs.nav?;
    if obs.recent_navs.len() < EROSION_WINDOW {
        return None;
    }

    let window = &obs.recent_navs[obs.recent_navs.len() - EROSION_WINDOW..];
    let strictly_decreasing = window.windows(2).all(|pair| pair[0].nav > pair[1].nav);
    if !strictly_decreasing {
        return None;
    }

    Some(Finding::new(
        obs.ticker,
        FindingKind::NavErosion,
        format!(
            "{}: 5-day NAV erosion detected. Fund losing underlying value.",
            obs.ticker
        ),
    ))
}

pub fn nav_market_inversion(obs: &Observation<'_>, _config: &MonitorConfig) -> Option<Finding> {
    let nav = obs.nav?;
    if nav <= obs.price {
        return None;
    }

    Some(Finding::new(
        obs.ticker,
        FindingKind::NavMarketInversion,
        format!(
            "{}: Market price ${:.2} is below NAV ${nav:.2}. Potential fund weakness.",
            obs.ticker, obs.price
        ),
    ))
}

pub fn principal_loss(obs: &Observation<'_>, config: &MonitorConfig) -> Option<Finding> {
    let position = obs.position?;
    let original = position.cost_basis();
    if original <= 0.0 {
        return None;
    }

    let current = position.shares * obs.price;
    let loss = (original - current) / original;

    let tiers = &config.principal_loss_thresholds;
    let severity = [
        (LossSeverity::Critical, tiers.critical),
        (LossSeverity::Danger, tiers.danger),
        (LossSeverity::Warning, tiers.warning),
    ]
    .into_iter()
    .find(|(_, threshold)| loss > *threshold)
    .map(|(severity, _)| severity)?;

    Some(Finding::new(
        obs.ticker,
        FindingKind::PrincipalLoss(severity),
        format!(
            "{} Principal Loss: {} down {:.2}% from original investment.",
            severity.label(),
            obs.ticker,
            loss * 100.0
        ),
    ))
}
