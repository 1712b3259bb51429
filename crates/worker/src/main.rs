use anyhow::Context;
use clap::Parser;
use etf_sentinel_core::config::{MonitorConfig, Settings};
use etf_sentinel_core::ingest::HttpMarketData;
use etf_sentinel_core::notify::heartbeat::Heartbeat;
use etf_sentinel_core::notify::webhook::WebhookNotifier;
use etf_sentinel_core::notify::{LogNotifier, Notifier};
use etf_sentinel_core::storage::JsonStore;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod context;
mod risk_job;
mod scheduler;
#[cfg(test)]
mod testing;
mod trim_job;

use context::Monitor;
use scheduler::{JobKind, Scheduler};

const TEST_ALERT_SUBJECT: &str = "TEST: ETF Monitor Alert System Working";
const TEST_ALERT_BODY: &str = "This is a TEST ALERT.\n\n\
If you received this notification, the ETF monitor notification channel is correctly configured.";

#[derive(Debug, Parser)]
#[command(name = "etf_sentinel_worker")]
struct Args {
    /// Run the risk job and the trim job once each, then exit.
    #[arg(long)]
    once: bool,

    /// Use the fast development interval for both jobs.
    #[arg(long)]
    dev: bool,

    /// Log notifications instead of sending them.
    #[arg(long)]
    dry_run: bool,

    /// Send a test notification through the configured channel and exit.
    #[arg(long)]
    test_alert: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let config = settings.load_monitor_config()?;
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let notifier = build_notifier(&settings, timeout, args.dry_run)?;

    if args.test_alert {
        notifier
            .send(TEST_ALERT_SUBJECT, TEST_ALERT_BODY)
            .await
            .context("test alert failed")?;
        tracing::info!(channel = ?notifier.channel(), "test alert sent");
        return Ok(());
    }

    let monitor = build_monitor(&settings, config, notifier)?;

    tracing::info!(
        data_dir = %monitor.store.dir().display(),
        watchlist = monitor.config.watchlist.len(),
        dry_run = args.dry_run,
        "ETF monitor started"
    );

    if args.once {
        run_job(&monitor, JobKind::Risk).await;
        run_job(&monitor, JobKind::Trim).await;
        return Ok(());
    }

    let (risk_interval, trim_interval) = intervals(&monitor.config, args.dev);
    tracing::info!(?risk_interval, ?trim_interval, dev = args.dev, "scheduler running");

    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(());
    });

    let scheduler = Scheduler::new(risk_interval, trim_interval, Instant::now());
    let runs = control_loop(&monitor, scheduler, stop_rx).await;
    tracing::info!(runs, "shutdown requested");

    Ok(())
}

/// Drives due jobs until `shutdown` resolves. A shutdown requested mid-job takes effect once that
/// job finishes. Returns the number of job runs.
async fn control_loop(
    monitor: &Monitor,
    mut scheduler: Scheduler,
    mut shutdown: oneshot::Receiver<()>,
) -> usize {
    let mut runs = 0;
    loop {
        for kind in scheduler.due_jobs(Instant::now()) {
            if !scheduler.try_begin(kind, Instant::now()) {
                tracing::debug!(job = kind.name(), "job still running; tick dropped");
                continue;
            }
            run_job(monitor, kind).await;
            scheduler.finish(kind, Instant::now());
            runs += 1;
        }

        tokio::select! {
            _ = tokio::time::sleep_until(scheduler.next_due()) => {}
            _ = &mut shutdown => return runs,
        }
    }
}

/// Runs one job to completion. Failures are reported, never propagated.
async fn run_job(monitor: &Monitor, kind: JobKind) {
    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("job", job = kind.name(), %run_id);
    let now = chrono::Utc::now();

    let result = async {
        match kind {
            JobKind::Risk => risk_job::run_risk_job(monitor, now).await.map(|_| ()),
            JobKind::Trim => trim_job::run_trim_job(monitor, now).await.map(|_| ()),
        }
    }
    .instrument(span.clone())
    .await;

    if let Err(err) = result {
        sentry_anyhow::capture_anyhow(&err);
        span.in_scope(|| tracing::error!(error = %err, "job failed"));
    }
}

fn intervals(config: &MonitorConfig, dev: bool) -> (Duration, Duration) {
    let s = &config.schedule;
    if dev {
        let d = Duration::from_secs(s.dev_interval_secs);
        return (d, d);
    }
    (
        Duration::from_secs(s.risk_interval_secs),
        Duration::from_secs(s.trim_interval_secs),
    )
}

fn build_notifier(
    settings: &Settings,
    timeout: Duration,
    dry_run: bool,
) -> anyhow::Result<Box<dyn Notifier>> {
    if dry_run {
        return Ok(Box::new(LogNotifier));
    }
    match settings.notify_webhook_url.as_deref() {
        Some(url) => Ok(Box::new(WebhookNotifier::new(url, timeout)?)),
        None => {
            tracing::warn!("NOTIFY_WEBHOOK_URL not set; notifications will only be logged");
            Ok(Box::new(LogNotifier))
        }
    }
}

fn build_monitor(
    settings: &Settings,
    config: MonitorConfig,
    notifier: Box<dyn Notifier>,
) -> anyhow::Result<Monitor> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let market = HttpMarketData::from_settings(settings, timeout)?;
    let store = JsonStore::open(&settings.data_dir)?;

    let heartbeat = config
        .heartbeat_url
        .as_deref()
        .or(settings.heartbeat_url.as_deref())
        .map(Heartbeat::new)
        .transpose()?;

    Ok(Monitor {
        config,
        store,
        market: Box::new(market),
        notifier,
        heartbeat,
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
