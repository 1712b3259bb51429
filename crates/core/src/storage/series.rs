use super::{JsonStore, MARKET_TRACKER_FILE, NAV_TRACKER_FILE};
use crate::domain::market::{NavPoint, PricePoint};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

type Series<P> = BTreeMap<String, Vec<P>>;

impl JsonStore {
    pub fn append_price(&self, ticker: &str, point: PricePoint) -> anyhow::Result<()> {
        self.append(MARKET_TRACKER_FILE, ticker, point)
    }

    pub fn append_nav(&self, ticker: &str, point: NavPoint) -> anyhow::Result<()> {
        self.append(NAV_TRACKER_FILE, ticker, point)
    }

    /// The last `n` price observations in insertion order; fewer when the history is short.
    pub fn last_prices(&self, ticker: &str, n: usize) -> Vec<PricePoint> {
        self.last(MARKET_TRACKER_FILE, ticker, n)
    }

    pub fn last_navs(&self, ticker: &str, n: usize) -> Vec<NavPoint> {
        self.last(NAV_TRACKER_FILE, ticker, n)
    }

    pub fn latest_price(&self, ticker: &str) -> Option<PricePoint> {
        self.last_prices(ticker, 1).pop()
    }

    pub fn latest_nav(&self, ticker: &str) -> Option<NavPoint> {
        self.last_navs(ticker, 1).pop()
    }

    pub fn price_history(&self, ticker: &str) -> Vec<PricePoint> {
        self.last_prices(ticker, usize::MAX)
    }

    pub fn nav_history(&self, ticker: &str) -> Vec<NavPoint> {
        self.last_navs(ticker, usize::MAX)
    }

    fn append<P>(&self, file: &str, ticker: &str, point: P) -> anyhow::Result<()>
    where
        P: Serialize + DeserializeOwned,
    {
        self.update(file, |series: &mut Series<P>| {
            series.entry(ticker.to_string()).or_default().push(point);
        })
    }

    fn last<P: DeserializeOwned>(&self, file: &str, ticker: &str, n: usize) -> Vec<P> {
        let mut series: Series<P> = self.load(file);
        let points = series.remove(ticker).unwrap_or_default();
        let skip = points.len().saturating_sub(n);
        points.into_iter().skip(skip).collect()
    }
}
