use crate::config::Settings;
use crate::domain::market::{Fundamentals, Quote};
use crate::error::MonitorError;
use crate::ingest::types::{positive, FundProfile, PolygonPrevResponse};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::time::Duration;

const DEFAULT_POLYGON_BASE_URL: &str = "https://api.polygon.io";
const DEFAULT_RETRIES: u32 = 1;
const FUNDS_PATH: &str = "/v1/funds";

/// Market-data capabilities consumed by the monitor.
///
/// `fetch_quote` errors skip the ticker for the cycle. NAV, AUM and yield come from one lookup;
/// each figure is `None` when routinely absent, and callers treat an `Err` as all three absent.
#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_quote(&self, ticker: &str) -> Result<Quote>;

    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals>;
}

/// Polygon for quotes, a JSON fund-profile service for NAV, AUM and yield.
#[derive(Debug, Clone)]
pub struct HttpMarketData {
    http: reqwest::Client,
    polygon_base_url: String,
    polygon_api_key: String,
    fund_base_url: String,
    fund_api_key: Option<String>,
    retries: u32,
}

impl HttpMarketData {
    pub fn from_settings(settings: &Settings, timeout: Duration) -> Result<Self> {
        let polygon_api_key = settings.require_polygon_api_key()?.to_string();
        let fund_base_url = settings.require_fund_data_base_url()?.to_string();
        let polygon_base_url = settings
            .polygon_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_POLYGON_BASE_URL.to_string());

        let retries = std::env::var("MARKET_DATA_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(DEFAULT_RETRIES);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            polygon_base_url,
            polygon_api_key,
            fund_base_url,
            fund_api_key: settings.fund_data_api_key.clone(),
            retries,
        })
    }

    fn quote_url(&self, ticker: &str) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/prev",
            self.polygon_base_url.trim_end_matches('/'),
            ticker
        )
    }

    fn profile_url(&self, ticker: &str) -> String {
        format!(
            "{}{}/{}",
            self.fund_base_url.trim_end_matches('/'),
            FUNDS_PATH,
            ticker
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.fund_api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn quote_once(&self, ticker: &str) -> Result<Quote> {
        let res = self
            .http
            .get(self.quote_url(ticker))
            .query(&[("adjusted", "true"), ("apiKey", self.polygon_api_key.as_str())])
            .send()
            .await
            .map_err(|e| MonitorError::transient("quote", e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(MonitorError::transient("quote", format!("polygon HTTP {status}")).into());
        }

        let parsed = res
            .json::<PolygonPrevResponse>()
            .await
            .context("failed to parse polygon response")?;
        quote_from_response(ticker, parsed)
    }

    async fn profile_once(&self, ticker: &str) -> Result<FundProfile> {
        let res = self
            .http
            .get(self.profile_url(ticker))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| MonitorError::transient("fund_profile", e))?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Err(MonitorError::data_unavailable(ticker, "no fund profile").into());
        }
        if !status.is_success() {
            return Err(
                MonitorError::transient("fund_profile", format!("fund data HTTP {status}")).into(),
            );
        }

        res.json::<FundProfile>()
            .await
            .context("failed to parse fund profile")
    }

    async fn fetch_profile(&self, ticker: &str) -> Result<FundProfile> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.profile_once(ticker).await {
                Ok(profile) => return Ok(profile),
                Err(err) if attempt >= self.retries || MonitorError::is_routine(&err) => {
                    return Err(err)
                }
                Err(err) => {
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(ticker, attempt, ?backoff, error = %err, "fund profile fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn quote_from_response(ticker: &str, resp: PolygonPrevResponse) -> Result<Quote> {
    let Some(bar) = resp.results.into_iter().next() else {
        return Err(MonitorError::data_unavailable(ticker, "empty aggregate results").into());
    };

    let (Some(price), Some(volume)) = (positive(Some(bar.c)), positive(Some(bar.v))) else {
        return Err(MonitorError::data_unavailable(ticker, "non-positive price or volume").into());
    };

    Ok(Quote { price, volume })
}

fn fundamentals_from_profile(profile: FundProfile) -> Fundamentals {
    Fundamentals {
        nav: positive(profile.nav),
        aum: positive(profile.total_assets),
        distribution_yield: positive(profile.distribution_yield),
    }
}

#[async_trait::async_trait]
impl MarketDataClient for HttpMarketData {
    fn provider_name(&self) -> &'static str {
        "polygon"
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<Quote> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.quote_once(ticker).await {
                Ok(quote) => return Ok(quote),
                Err(err) if attempt >= self.retries || MonitorError::is_routine(&err) => {
                    return Err(err)
                }
                Err(err) => {
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(ticker, attempt, ?backoff, error = %err, "quote fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals> {
        Ok(fundamentals_from_profile(self.fetch_profile(ticker).await?))
    }
}
