use super::{JsonStore, AUM_TRACKER_FILE};
use crate::domain::market::{AumRecord, AumSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// On-disk entry. Older trackers stored only the last AUM figure per ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredAum {
    Record(AumRecord),
    Bare(f64),
}

impl From<StoredAum> for AumRecord {
    fn from(stored: StoredAum) -> Self {
        match stored {
            StoredAum::Record(record) => record,
            // No observation time was kept; the epoch marks it as unknown.
            StoredAum::Bare(aum) => AumRecord {
                current: AumSnapshot {
                    aum,
                    date: DateTime::<Utc>::default(),
                },
                previous: None,
            },
        }
    }
}

impl JsonStore {
    pub fn snapshot_aum(&self, ticker: &str) -> Option<AumSnapshot> {
        self.aum_snapshots().remove(ticker).map(|r| r.current)
    }

    /// Overwrites the ticker's snapshot, keeping the displaced one as `previous`.
    /// Returns the displaced snapshot.
    pub fn put_snapshot_aum(
        &self,
        ticker: &str,
        snapshot: AumSnapshot,
    ) -> anyhow::Result<Option<AumSnapshot>> {
        self.update(AUM_TRACKER_FILE, |records: &mut BTreeMap<String, StoredAum>| {
            let previous = records
                .remove(ticker)
                .map(|stored| AumRecord::from(stored).current);
            records.insert(
                ticker.to_string(),
                StoredAum::Record(AumRecord {
                    current: snapshot,
                    previous: previous.clone(),
                }),
            );
            previous
        })
    }

    pub fn aum_snapshots(&self) -> BTreeMap<String, AumRecord> {
        let stored: BTreeMap<String, StoredAum> = self.load(AUM_TRACKER_FILE);
        stored
            .into_iter()
            .map(|(ticker, entry)| (ticker, entry.into()))
            .collect()
    }
}
