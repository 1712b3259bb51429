use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use etf_sentinel_core::config::Settings;
use etf_sentinel_core::domain::market::{AumRecord, NavPoint, PortfolioPosition, PricePoint};
use etf_sentinel_core::report::{self, PortfolioReport, TickerRisk};
use etf_sentinel_core::storage::JsonStore;

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

    let store = match JsonStore::open(&settings.data_dir) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "data dir unavailable; starting API in degraded mode");
            None
        }
    };

    let app = router(AppState { store }).layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, data_dir = %settings.data_dir, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/portfolio", get(get_portfolio))
        .route("/portfolio/health", get(get_portfolio_health))
        .route("/aum", get(get_aum))
        .route("/series/:ticker/nav", get(get_nav_series))
        .route("/series/:ticker/prices", get(get_price_series))
        .route("/risk/:ticker", get(get_ticker_risk))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Read-only view over the worker's data directory. Every request re-reads the files.
#[derive(Debug, Clone)]
struct AppState {
    store: Option<Arc<JsonStore>>,
}

impl AppState {
    fn store(&self) -> Result<&JsonStore, StatusCode> {
        self.store.as_deref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SeriesQuery {
    /// Most recent `limit` points only.
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Series<T> {
    ticker: String,
    points: Vec<T>,
}

fn normalize(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

fn tail<T>(mut points: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(n) = limit {
        let skip = points.len().saturating_sub(n);
        points.drain(..skip);
    }
    points
}

async fn get_portfolio(
    State(state): State<AppState>,
) -> Result<Json<Vec<PortfolioPosition>>, StatusCode> {
    Ok(Json(state.store()?.portfolio()))
}

async fn get_portfolio_health(
    State(state): State<AppState>,
) -> Result<Json<PortfolioReport>, StatusCode> {
    Ok(Json(report::portfolio_report(state.store()?)))
}

async fn get_aum(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, AumRecord>>, StatusCode> {
    Ok(Json(state.store()?.aum_snapshots()))
}

async fn get_nav_series(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(q): Query<SeriesQuery>,
) -> Result<Json<Series<NavPoint>>, StatusCode> {
    let ticker = normalize(&ticker);
    let points = state.store()?.nav_history(&ticker);
    if points.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(Series {
        ticker,
        points: tail(points, q.limit),
    }))
}

async fn get_price_series(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(q): Query<SeriesQuery>,
) -> Result<Json<Series<PricePoint>>, StatusCode> {
    let ticker = normalize(&ticker);
    let points = state.store()?.price_history(&ticker);
    if points.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(Series {
        ticker,
        points: tail(points, q.limit),
    }))
}

async fn get_ticker_risk(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<TickerRisk>, StatusCode> {
    let ticker = normalize(&ticker);
    let risk = report::ticker_risk(state.store()?, &ticker);
    if risk.latest_price.is_none() && risk.latest_nav.is_none() && risk.aum.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(risk))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
