use super::{JsonStore, ALERT_HISTORY_FILE};
use crate::domain::timestamp::Stamp;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

type AlertHistory = BTreeMap<String, Stamp>;

impl JsonStore {
    /// Decide-and-record for an alert fingerprint.
    ///
    /// Returns `true` when no record exists or the last send is older than `window`, rewriting the
    /// record with `now` before releasing the write lock. Returns `false` without writing otherwise.
    /// Records that have aged out of `window` are dropped on every write.
    pub fn claim_alert_slot(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> anyhow::Result<bool> {
        let _guard = self.lock();
        let mut history: AlertHistory = self.load_for_update(ALERT_HISTORY_FILE)?;

        if let Some(Stamp(last_sent)) = history.get(fingerprint) {
            if now - *last_sent <= window {
                return Ok(false);
            }
        }

        history.retain(|_, Stamp(sent)| now - *sent <= window);
        history.insert(fingerprint.to_string(), Stamp(now));
        self.save(ALERT_HISTORY_FILE, &history)?;
        Ok(true)
    }

    pub fn alert_last_sent(&self, fingerprint: &str) -> Option<DateTime<Utc>> {
        let history: AlertHistory = self.load(ALERT_HISTORY_FILE);
        history.get(fingerprint).map(|s| s.0)
    }
}
