use super::{JsonStore, TRIM_HISTORY_FILE};
use crate::domain::timestamp::Stamp;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

impl JsonStore {
    pub fn last_trim(&self, ticker: &str) -> Option<DateTime<Utc>> {
        let history: BTreeMap<String, Stamp> = self.load(TRIM_HISTORY_FILE);
        history.get(ticker).map(|s| s.0)
    }

    /// Only called after a trim alert was actually dispatched.
    pub fn record_trim(&self, ticker: &str, at: DateTime<Utc>) -> anyhow::Result<()> {
        self.update(TRIM_HISTORY_FILE, |history: &mut BTreeMap<String, Stamp>| {
            history.insert(ticker.to_string(), Stamp(at));
        })
    }
}
