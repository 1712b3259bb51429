use crate::context::Monitor;
use etf_sentinel_core::config::MonitorConfig;
use etf_sentinel_core::domain::market::{Fundamentals, Quote};
use etf_sentinel_core::error::MonitorError;
use etf_sentinel_core::ingest::MarketDataClient;
use etf_sentinel_core::notify::{Channel, Notifier};
use etf_sentinel_core::storage::JsonStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Canned market data; a ticker without an entry behaves like a provider with no data for it.
#[derive(Debug, Default)]
pub struct FakeMarket {
    pub quotes: HashMap<String, Quote>,
    pub navs: HashMap<String, f64>,
    pub aums: HashMap<String, f64>,
    pub yields: HashMap<String, f64>,
    /// Fundamentals lookups served, per ticker.
    pub fundamentals_calls: HashMap<String, usize>,
}

struct SharedMarket(Arc<Mutex<FakeMarket>>);

#[async_trait::async_trait]
impl MarketDataClient for SharedMarket {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_quote(&self, ticker: &str) -> anyhow::Result<Quote> {
        let quote = self.0.lock().unwrap().quotes.get(ticker).cloned();
        quote.ok_or_else(|| MonitorError::data_unavailable(ticker, "no quote").into())
    }

    async fn fetch_fundamentals(&self, ticker: &str) -> anyhow::Result<Fundamentals> {
        let mut market = self.0.lock().unwrap();
        *market
            .fundamentals_calls
            .entry(ticker.to_string())
            .or_default() += 1;
        Ok(Fundamentals {
            nav: market.navs.get(ticker).copied(),
            aum: market.aums.get(ticker).copied(),
            distribution_yield: market.yields.get(ticker).copied(),
        })
    }
}

type Outbox = Arc<Mutex<Vec<(String, String)>>>;

struct RecordingNotifier {
    sent: Outbox,
    fail: Arc<Mutex<bool>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> Channel {
        Channel::Log
    }

    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(MonitorError::transient("notify", "relay unreachable").into());
        }
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub struct Fixture {
    pub monitor: Monitor,
    market: Arc<Mutex<FakeMarket>>,
    sent: Outbox,
    fail_sends: Arc<Mutex<bool>>,
    dir: PathBuf,
}

impl Fixture {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_quote(&self, ticker: &str, quote: Quote) {
        self.market
            .lock()
            .unwrap()
            .quotes
            .insert(ticker.to_string(), quote);
    }

    pub fn set_nav(&self, ticker: &str, nav: f64) {
        self.market.lock().unwrap().navs.insert(ticker.to_string(), nav);
    }

    pub fn set_aum(&self, ticker: &str, aum: f64) {
        self.market.lock().unwrap().aums.insert(ticker.to_string(), aum);
    }

    pub fn fundamentals_calls(&self, ticker: &str) -> usize {
        self.market
            .lock()
            .unwrap()
            .fundamentals_calls
            .get(ticker)
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_sends(&self, fail: bool) {
        *self.fail_sends.lock().unwrap() = fail;
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

pub fn monitor_with(config: MonitorConfig, market: FakeMarket) -> Fixture {
    let dir = std::env::temp_dir().join(format!("etf_sentinel_worker_{}", uuid::Uuid::new_v4()));
    let store = JsonStore::open(&dir).unwrap();
    let market = Arc::new(Mutex::new(market));
    let sent: Outbox = Arc::default();
    let fail_sends = Arc::new(Mutex::new(false));

    let monitor = Monitor {
        config,
        store,
        market: Box::new(SharedMarket(market.clone())),
        notifier: Box::new(RecordingNotifier {
            sent: sent.clone(),
            fail: fail_sends.clone(),
        }),
        heartbeat: None,
    };

    Fixture {
        monitor,
        market,
        sent,
        fail_sends,
        dir,
    }
}
