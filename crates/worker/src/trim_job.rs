use crate::context::{log_fetch_failure, Monitor};
use chrono::{DateTime, Utc};
use etf_sentinel_core::alerts::{self, DispatchOutcome};
use etf_sentinel_core::rotation::{
    compose_trim_alert, rank_rotation_targets, should_trim, trim_alert_subject, CandidateMetrics,
    TrimDecision, TrimPlan,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrimRunSummary {
    pub positions: usize,
    pub plans: usize,
    pub cooling_down: usize,
    pub dispatched: usize,
    pub suppressed: usize,
    pub failed: usize,
}

/// One trim-evaluation pass over the held positions.
pub async fn run_trim_job(monitor: &Monitor, now: DateTime<Utc>) -> anyhow::Result<TrimRunSummary> {
    let store = &monitor.store;
    let settings = &monitor.config.trim;
    let portfolio = store.portfolio();

    let mut summary = TrimRunSummary {
        positions: portfolio.len(),
        ..Default::default()
    };
    if portfolio.is_empty() {
        tracing::info!("no portfolio positions; nothing to trim");
        return Ok(summary);
    }

    // Loaded on first plan; most passes never need it.
    let mut candidates: Option<Vec<CandidateMetrics>> = None;

    for position in &portfolio {
        let ticker = position.ticker.as_str();
        let Some(price) = store.latest_price(ticker).map(|p| p.price) else {
            tracing::debug!(ticker, "no stored price; trim check skipped");
            continue;
        };

        let plan = match should_trim(position, price, store.last_trim(ticker), now, settings) {
            TrimDecision::NoTrim => continue,
            TrimDecision::CoolingDown {
                last_trim,
                ready_at,
            } => {
                summary.cooling_down += 1;
                tracing::info!(ticker, %last_trim, %ready_at, "trim skipped: cooldown active");
                continue;
            }
            TrimDecision::Plan(plan) => plan,
        };
        summary.plans += 1;

        if candidates.is_none() {
            candidates = Some(load_candidates(monitor).await);
        }
        let pool = candidates.as_deref().unwrap_or_default();

        match dispatch_plan(monitor, &plan, pool, now).await {
            DispatchOutcome::Sent => {
                summary.dispatched += 1;
                if let Err(err) = store.record_trim(ticker, now) {
                    tracing::warn!(ticker, error = %err, "failed to record trim cooldown");
                }
            }
            DispatchOutcome::Suppressed => summary.suppressed += 1,
            DispatchOutcome::Failed => summary.failed += 1,
        }
    }

    tracing::info!(
        positions = summary.positions,
        plans = summary.plans,
        cooling_down = summary.cooling_down,
        dispatched = summary.dispatched,
        "trim cycle complete"
    );
    Ok(summary)
}

async fn dispatch_plan(
    monitor: &Monitor,
    plan: &TrimPlan,
    candidates: &[CandidateMetrics],
    now: DateTime<Utc>,
) -> DispatchOutcome {
    let targets = rank_rotation_targets(&plan.ticker, candidates, &monitor.config.rotation);
    tracing::info!(
        ticker = %plan.ticker,
        gain = plan.gain,
        shares = plan.shares_to_trim,
        targets = targets.len(),
        "trim plan"
    );

    let body = compose_trim_alert(plan, &targets, monitor.config.trim.capital_gains_tax_rate);
    let gate = monitor.gate();
    alerts::dispatch(
        &gate,
        monitor.notifier.as_ref(),
        &trim_alert_subject(plan),
        &body,
        now,
    )
    .await
}

async fn load_candidates(monitor: &Monitor) -> Vec<CandidateMetrics> {
    let window = monitor.config.rotation.price_window;
    let mut out = Vec::new();

    for ticker in monitor.config.watchlist() {
        let distribution_yield = match monitor.market.fetch_fundamentals(ticker).await {
            Ok(f) => f.distribution_yield,
            Err(err) => {
                log_fetch_failure(ticker, "fundamentals", &err);
                None
            }
        };

        match CandidateMetrics::from_store(&monitor.store, ticker, distribution_yield, window) {
            Some(metrics) => out.push(metrics),
            None => tracing::debug!(ticker, "insufficient data for rotation scoring"),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{monitor_with, FakeMarket, Fixture};
    use chrono::{Duration, TimeZone};
    use etf_sentinel_core::config::MonitorConfig;
    use etf_sentinel_core::domain::market::{AumSnapshot, NavPoint, PortfolioPosition, PricePoint};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 14, 0, 0).unwrap()
    }

    fn price(fx: &Fixture, ticker: &str, at: DateTime<Utc>, price: f64) {
        fx.monitor
            .store
            .append_price(
                ticker,
                PricePoint {
                    date: at,
                    price,
                    volume: 1_000.0,
                    source: "test".to_string(),
                },
            )
            .unwrap();
    }

    /// Held YMAX at $10 now trading at $13; ULTY and QQQY are eligible rotation targets.
    fn fixture() -> Fixture {
        let mut market = FakeMarket::default();
        market.yields.insert("ULTY".to_string(), 0.80);
        market.yields.insert("QQQY".to_string(), 0.40);
        market.yields.insert("YMAX".to_string(), 0.90);
        let config = MonitorConfig {
            watchlist: vec!["YMAX".into(), "ULTY".into(), "QQQY".into()],
            ..MonitorConfig::default()
        };
        let fx = monitor_with(config, market);

        fx.monitor
            .store
            .replace_portfolio(&[PortfolioPosition {
                ticker: "YMAX".to_string(),
                shares: 100.0,
                buy_nav: 10.0,
            }])
            .unwrap();

        for ticker in ["YMAX", "ULTY", "QQQY"] {
            for i in 0..60 {
                price(&fx, ticker, t0() - Duration::hours(60 - i), 13.0);
            }
            fx.monitor
                .store
                .append_nav(ticker, NavPoint { date: t0(), nav: 13.0 })
                .unwrap();
            fx.monitor
                .store
                .put_snapshot_aum(ticker, AumSnapshot { aum: 1e9, date: t0() })
                .unwrap();
        }
        fx
    }

    #[tokio::test]
    async fn dispatched_plan_ranks_other_tickers_and_starts_cooldown() {
        let fx = fixture();

        let summary = run_trim_job(&fx.monitor, t0()).await.unwrap();
        assert_eq!(summary.plans, 1);
        assert_eq!(summary.dispatched, 1);

        let sent = fx.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ETF Trim Recommendation: YMAX");
        let body = &sent[0].1;
        assert!(body.contains("Rotation targets"), "{body}");
        assert!(body.contains("1. ULTY"), "{body}");
        assert!(body.contains("2. QQQY"), "{body}");
        assert!(!body.contains(". YMAX:"), "{body}");

        assert_eq!(fx.monitor.store.last_trim("YMAX"), Some(t0()));
    }

    #[tokio::test]
    async fn cooldown_skips_without_alert_or_cooldown_refresh() {
        let fx = fixture();
        let earlier = t0() - Duration::days(5);
        fx.monitor.store.record_trim("YMAX", earlier).unwrap();

        let summary = run_trim_job(&fx.monitor, t0()).await.unwrap();
        assert_eq!(summary.cooling_down, 1);
        assert_eq!(summary.plans, 0);
        assert!(fx.sent().is_empty());
        assert_eq!(fx.monitor.store.last_trim("YMAX"), Some(earlier));
    }

    #[tokio::test]
    async fn suppressed_or_failed_plan_does_not_start_cooldown() {
        let fx = fixture();
        let gate = fx.monitor.gate();

        let first = run_trim_job(&fx.monitor, t0()).await.unwrap();
        assert_eq!(first.dispatched, 1);
        let body = fx.sent()[0].1.clone();
        fx.monitor
            .store
            .record_trim("YMAX", t0() - Duration::days(31))
            .unwrap();

        // Cooldown has elapsed, but the identical body is still inside the dedup window.
        assert!(!gate
            .should_send(&alerts::fingerprint(&body), t0() + Duration::hours(1))
            .unwrap());

        let again = run_trim_job(&fx.monitor, t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(again.suppressed, 1);
        assert_eq!(
            fx.monitor.store.last_trim("YMAX"),
            Some(t0() - Duration::days(31))
        );

        fx.fail_sends(true);
        let failed = run_trim_job(&fx.monitor, t0() + Duration::days(2))
            .await
            .unwrap();
        assert_eq!(failed.failed, 1);
        assert_eq!(
            fx.monitor.store.last_trim("YMAX"),
            Some(t0() - Duration::days(31))
        );
    }

    #[tokio::test]
    async fn plan_without_eligible_targets_holds_cash() {
        let mut fx = fixture();
        fx.monitor.store.replace_portfolio(&[]).unwrap();
        assert_eq!(run_trim_job(&fx.monitor, t0()).await.unwrap().positions, 0);

        fx.monitor
            .store
            .replace_portfolio(&[PortfolioPosition {
                ticker: "ULTY".to_string(),
                shares: 50.0,
                buy_nav: 5.0,
            }])
            .unwrap();
        fx.monitor.config.rotation.min_yield = 0.95;

        let summary = run_trim_job(&fx.monitor, t0()).await.unwrap();
        assert_eq!(summary.dispatched, 1);
        assert!(fx.sent()[0].1.contains("hold proceeds as cash"));
        assert!(fx.sent()[0].1.contains("10 shares (20% of position)"));
    }
}
