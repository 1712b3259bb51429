use crate::context::{log_fetch_failure, Monitor};
use chrono::{DateTime, Utc};
use etf_sentinel_core::alerts::{self, DispatchOutcome, AUM_ALERT_SUBJECT, RISK_ALERT_SUBJECT};
use etf_sentinel_core::config::DecayReference;
use etf_sentinel_core::domain::finding::Finding;
use etf_sentinel_core::domain::market::{
    AumSnapshot, Fundamentals, NavPoint, PortfolioPosition, PricePoint,
};
use etf_sentinel_core::signals::{self, mean, Observation, AVERAGE_WINDOW, EROSION_WINDOW};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskRunSummary {
    pub tickers_evaluated: usize,
    pub tickers_skipped: usize,
    pub findings: usize,
    pub aum_findings: usize,
    pub alert: Option<DispatchOutcome>,
    pub aum_alert: Option<DispatchOutcome>,
}

/// One risk-evaluation pass over the watchlist, with the AUM check riding on the same
/// fundamentals lookup.
///
/// Per-ticker failures are logged and skipped; the pass itself only fails on programming errors.
pub async fn run_risk_job(monitor: &Monitor, now: DateTime<Utc>) -> anyhow::Result<RiskRunSummary> {
    let mut summary = RiskRunSummary::default();
    let portfolio = monitor.store.portfolio();

    let mut findings: Vec<Finding> = Vec::new();
    let mut aum_findings: Vec<Finding> = Vec::new();
    for ticker in monitor.config.watchlist() {
        let fundamentals = match monitor.market.fetch_fundamentals(ticker).await {
            Ok(f) => f,
            Err(err) => {
                log_fetch_failure(ticker, "fundamentals", &err);
                Fundamentals::default()
            }
        };

        match evaluate_ticker(monitor, ticker, fundamentals.nav, &portfolio, now).await {
            Some(found) => {
                summary.tickers_evaluated += 1;
                findings.extend(found);
            }
            None => summary.tickers_skipped += 1,
        }

        match fundamentals.aum {
            Some(aum) => aum_findings.extend(check_aum(monitor, ticker, aum, now)),
            None => tracing::debug!(ticker, "no AUM reported"),
        }
    }
    summary.findings = findings.len();
    summary.aum_findings = aum_findings.len();

    summary.alert = dispatch_findings(monitor, RISK_ALERT_SUBJECT, &findings, now).await;
    summary.aum_alert = dispatch_findings(monitor, AUM_ALERT_SUBJECT, &aum_findings, now).await;

    if let Some(heartbeat) = &monitor.heartbeat {
        heartbeat.ping().await;
    }

    tracing::info!(
        evaluated = summary.tickers_evaluated,
        skipped = summary.tickers_skipped,
        findings = summary.findings,
        aum_findings = summary.aum_findings,
        "risk cycle complete"
    );
    Ok(summary)
}

/// `None` when the ticker was skipped for lack of a quote.
async fn evaluate_ticker(
    monitor: &Monitor,
    ticker: &str,
    nav: Option<f64>,
    portfolio: &[PortfolioPosition],
    now: DateTime<Utc>,
) -> Option<Vec<Finding>> {
    let store = &monitor.store;
    let config = &monitor.config;

    let quote = match monitor.market.fetch_quote(ticker).await {
        Ok(quote) => quote,
        Err(err) => {
            log_fetch_failure(ticker, "quote", &err);
            return None;
        }
    };

    if nav.is_none() {
        tracing::info!(ticker, "no NAV available; skipping NAV-based checks");
    }

    // Baselines come from history recorded before this observation.
    let prior_prices = store.last_prices(ticker, AVERAGE_WINDOW);
    let avg_volume = mean(prior_prices.iter().map(|p| p.volume).filter(|v| *v > 0.0));
    let decay_baseline = match config.risk_thresholds.nav_decay_reference {
        DecayReference::Price => mean(prior_prices.iter().map(|p| p.price)),
        DecayReference::Nav => mean(store.last_navs(ticker, AVERAGE_WINDOW).iter().map(|n| n.nav)),
    };

    let point = PricePoint {
        date: now,
        price: quote.price,
        volume: quote.volume,
        source: monitor.market.provider_name().to_string(),
    };
    if let Err(err) = store.append_price(ticker, point) {
        tracing::warn!(ticker, error = %err, "failed to persist price point");
    }

    let recent_navs = match nav {
        Some(nav) => {
            if let Err(err) = store.append_nav(ticker, NavPoint { date: now, nav }) {
                tracing::warn!(ticker, error = %err, "failed to persist NAV point");
            }
            store.last_navs(ticker, EROSION_WINDOW)
        }
        None => Vec::new(),
    };

    let obs = Observation {
        ticker,
        price: quote.price,
        volume: quote.volume,
        nav,
        avg_volume,
        decay_baseline,
        recent_navs: &recent_navs,
        position: portfolio.iter().find(|p| p.ticker == ticker),
    };

    let found = signals::evaluate(&obs, config);
    for f in &found {
        tracing::info!(ticker, kind = ?f.kind, "risk finding");
    }
    Some(found)
}

fn check_aum(monitor: &Monitor, ticker: &str, aum: f64, now: DateTime<Utc>) -> Vec<Finding> {
    let previous = monitor.store.snapshot_aum(ticker).map(|s| s.aum);
    let found = signals::evaluate_aum(
        ticker,
        aum,
        previous,
        monitor.config.aum_thresholds.get(ticker),
    );

    if let Err(err) = monitor
        .store
        .put_snapshot_aum(ticker, AumSnapshot { aum, date: now })
    {
        tracing::warn!(ticker, error = %err, "failed to persist AUM snapshot");
    }
    found
}

async fn dispatch_findings(
    monitor: &Monitor,
    subject: &str,
    findings: &[Finding],
    now: DateTime<Utc>,
) -> Option<DispatchOutcome> {
    let Some(body) = alerts::compose(findings) else {
        tracing::info!(subject, "no alerts this cycle");
        return None;
    };

    let gate = monitor.gate();
    Some(alerts::dispatch(&gate, monitor.notifier.as_ref(), subject, &body, now).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{monitor_with, FakeMarket};
    use chrono::{Duration, TimeZone};
    use etf_sentinel_core::config::{AumThresholds, MonitorConfig};
    use etf_sentinel_core::domain::market::Quote;
    use etf_sentinel_core::storage::AUM_TRACKER_FILE;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 14, 0, 0).unwrap()
    }

    fn config(watchlist: &[&str]) -> MonitorConfig {
        MonitorConfig {
            watchlist: watchlist.iter().map(|s| s.to_string()).collect(),
            ..MonitorConfig::default()
        }
    }

    fn quote(price: f64, volume: f64) -> Quote {
        Quote { price, volume }
    }

    #[tokio::test]
    async fn failed_quote_skips_only_that_ticker() {
        let mut market = FakeMarket::default();
        market.quotes.insert("GOOD".to_string(), quote(105.0, 1_000.0));
        market.navs.insert("GOOD".to_string(), 100.0);
        let fx = monitor_with(config(&["BAD", "GOOD"]), market);

        let summary = run_risk_job(&fx.monitor, t0()).await.unwrap();
        assert_eq!(summary.tickers_skipped, 1);
        assert_eq!(summary.tickers_evaluated, 1);
        assert_eq!(summary.alert, Some(DispatchOutcome::Sent));

        let sent = fx.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, RISK_ALERT_SUBJECT);
        assert!(sent[0].1.contains("PREMIUM detected: GOOD trading 5.00% above NAV"));
        let stored = fx.monitor.store.last_prices("GOOD", 10);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].date, t0());
        assert!(fx.monitor.store.last_prices("BAD", 10).is_empty());
    }

    #[tokio::test]
    async fn identical_alert_is_suppressed_on_next_cycle() {
        let mut market = FakeMarket::default();
        market.quotes.insert("ULTY".to_string(), quote(105.0, 1_000.0));
        market.navs.insert("ULTY".to_string(), 100.0);
        let fx = monitor_with(config(&["ULTY"]), market);

        let first = run_risk_job(&fx.monitor, t0()).await.unwrap();
        let second = run_risk_job(&fx.monitor, t0() + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(first.alert, Some(DispatchOutcome::Sent));
        assert_eq!(second.alert, Some(DispatchOutcome::Suppressed));
        assert_eq!(fx.sent().len(), 1);
    }

    #[tokio::test]
    async fn missing_nav_still_records_price_and_runs_other_rules() {
        let mut market = FakeMarket::default();
        market.quotes.insert("ULTY".to_string(), quote(6.0, 10.0));
        let fx = monitor_with(config(&["ULTY"]), market);
        for i in 0..3 {
            fx.monitor
                .store
                .append_price(
                    "ULTY",
                    PricePoint {
                        date: t0() - Duration::hours(3 - i),
                        price: 6.0,
                        volume: 1_000.0,
                        source: "test".to_string(),
                    },
                )
                .unwrap();
        }

        let summary = run_risk_job(&fx.monitor, t0()).await.unwrap();
        assert_eq!(summary.findings, 1);
        assert!(fx.sent()[0].1.contains("ULTY: Volume dropped 99.00%"));
        assert!(fx.monitor.store.last_navs("ULTY", 5).is_empty());
        assert_eq!(fx.monitor.store.last_prices("ULTY", 10).len(), 4);
    }

    #[tokio::test]
    async fn erosion_fires_on_fifth_falling_nav() {
        let mut cfg = config(&["ULTY"]);
        cfg.risk_thresholds.premium_discount_pct = 0.5;
        let fx = monitor_with(cfg, FakeMarket::default());

        for (i, nav) in [100.0, 99.0, 98.0, 97.0, 96.0].into_iter().enumerate() {
            fx.set_quote("ULTY", quote(nav, 1_000.0));
            fx.set_nav("ULTY", nav);
            let summary = run_risk_job(&fx.monitor, t0() + Duration::hours(i as i64))
                .await
                .unwrap();
            assert_eq!(summary.findings, usize::from(i == 4), "cycle {i}");
        }
        assert!(fx.sent()[0].1.contains("5-day NAV erosion detected"));
    }

    #[tokio::test]
    async fn aum_milestone_fires_once_on_crossing() {
        let mut cfg = config(&["ULTY"]);
        cfg.aum_thresholds.insert(
            "ULTY".to_string(),
            AumThresholds {
                min_aum: None,
                max_aum: Some(1_000_000_000.0),
            },
        );
        let mut market = FakeMarket::default();
        market.quotes.insert("ULTY".to_string(), quote(6.0, 1_000.0));
        let fx = monitor_with(cfg, market);

        let mut fired = Vec::new();
        for (i, aum) in [900e6, 1_100e6, 1_200e6].into_iter().enumerate() {
            fx.set_aum("ULTY", aum);
            let s = run_risk_job(&fx.monitor, t0() + Duration::hours(i as i64))
                .await
                .unwrap();
            fired.push(s.aum_findings);
        }
        assert_eq!(fired, vec![0, 1, 0]);
        assert_eq!(fx.sent().len(), 1);
        assert_eq!(fx.sent()[0].0, AUM_ALERT_SUBJECT);
    }

    #[tokio::test]
    async fn quiet_cycle_sends_nothing() {
        let mut market = FakeMarket::default();
        market.quotes.insert("ULTY".to_string(), quote(100.0, 1_000.0));
        market.navs.insert("ULTY".to_string(), 100.0);
        let fx = monitor_with(config(&["ULTY"]), market);

        let summary = run_risk_job(&fx.monitor, t0()).await.unwrap();
        assert_eq!(summary.alert, None);
        assert!(fx.sent().is_empty());
    }

    /// Prior prices sit at 8.00 while prior NAVs sit at 10.00; the current NAV is 8.50.
    fn decay_fixture(reference: DecayReference) -> crate::testing::Fixture {
        let mut cfg = config(&["ULTY"]);
        cfg.risk_thresholds.nav_decay_reference = reference;
        let mut market = FakeMarket::default();
        market.quotes.insert("ULTY".to_string(), quote(8.5, 1_000.0));
        market.navs.insert("ULTY".to_string(), 8.5);
        let fx = monitor_with(cfg, market);

        for i in 0..3 {
            let at = t0() - Duration::hours(3 - i);
            fx.monitor
                .store
                .append_price(
                    "ULTY",
                    PricePoint {
                        date: at,
                        price: 8.0,
                        volume: 1_000.0,
                        source: "test".to_string(),
                    },
                )
                .unwrap();
            fx.monitor
                .store
                .append_nav("ULTY", NavPoint { date: at, nav: 10.0 })
                .unwrap();
        }
        fx
    }

    #[tokio::test]
    async fn nav_decay_against_nav_history_average() {
        let fx = decay_fixture(DecayReference::Nav);

        let summary = run_risk_job(&fx.monitor, t0()).await.unwrap();
        assert_eq!(summary.findings, 1);
        let body = &fx.sent()[0].1;
        assert!(
            body.contains("ULTY: NAV has dropped 15.00% below its 30-observation average ($8.50 vs $10.00)"),
            "{body}"
        );
    }

    #[tokio::test]
    async fn nav_decay_against_price_average_ignores_nav_history() {
        let fx = decay_fixture(DecayReference::Price);

        let summary = run_risk_job(&fx.monitor, t0()).await.unwrap();
        assert_eq!(summary.findings, 0);
        assert!(fx.sent().is_empty());
    }

    #[tokio::test]
    async fn fundamentals_are_fetched_once_per_ticker_per_cycle() {
        let mut cfg = config(&["ULTY", "BAD"]);
        cfg.aum_thresholds.insert(
            "ULTY".to_string(),
            AumThresholds {
                min_aum: Some(50_000_000.0),
                max_aum: None,
            },
        );
        let mut market = FakeMarket::default();
        market.quotes.insert("ULTY".to_string(), quote(6.0, 1_000.0));
        market.navs.insert("ULTY".to_string(), 6.0);
        market.aums.insert("ULTY".to_string(), 10_000_000.0);
        let fx = monitor_with(cfg, market);

        let summary = run_risk_job(&fx.monitor, t0()).await.unwrap();
        assert_eq!(summary.aum_findings, 1);
        assert_eq!(fx.fundamentals_calls("ULTY"), 1);
        assert_eq!(fx.fundamentals_calls("BAD"), 1);
    }

    #[tokio::test]
    async fn existing_bare_aum_tracker_prevents_repeat_milestone() {
        let mut cfg = config(&["ULTY"]);
        cfg.aum_thresholds.insert(
            "ULTY".to_string(),
            AumThresholds {
                min_aum: None,
                max_aum: Some(1_000_000_000.0),
            },
        );
        let mut market = FakeMarket::default();
        market.quotes.insert("ULTY".to_string(), quote(6.0, 1_000.0));
        market.aums.insert("ULTY".to_string(), 1_300_000_000.0);
        let fx = monitor_with(cfg, market);
        std::fs::write(
            fx.monitor.store.dir().join(AUM_TRACKER_FILE),
            r#"{"ULTY": 1200000000.0}"#,
        )
        .unwrap();

        let summary = run_risk_job(&fx.monitor, t0()).await.unwrap();
        assert_eq!(summary.aum_findings, 0);
        assert!(fx.sent().is_empty());
    }
}
