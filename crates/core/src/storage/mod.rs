//! File-backed persistence: one JSON document per logical series, each loadable on its own.
//!
//! Writers replace a file by writing a fsynced temporary sibling and renaming it over the target,
//! so a concurrent reader (the dashboard API) sees either the previous or the new document.
//! Unreadable documents are treated as empty and reported with a warning.

pub mod aum;
pub mod dedup;
pub mod portfolio;
pub mod series;
pub mod trim_history;

use crate::error::MonitorError;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const NAV_TRACKER_FILE: &str = "nav_tracker.json";
pub const MARKET_TRACKER_FILE: &str = "market_price_tracker.json";
pub const AUM_TRACKER_FILE: &str = "aum_tracker.json";
pub const ALERT_HISTORY_FILE: &str = "alert_history.json";
pub const TRIM_HISTORY_FILE: &str = "trim_history.json";
pub const PORTFOLIO_FILE: &str = "portfolio.json";

#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create data dir {} failed", dir.display()))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Document text; `None` when the file is missing or blank.
    fn read_text(&self, file: &str) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(self.dir.join(file)) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read-only load. Missing, unreadable or corrupt documents read as empty; nothing is touched.
    pub(crate) fn load<T: DeserializeOwned + Default>(&self, file: &str) -> T {
        let text = match self.read_text(file) {
            Ok(Some(text)) => text,
            Ok(None) => return T::default(),
            Err(e) => {
                tracing::warn!(file, error = %e, "read failed; treating as empty");
                return T::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                let err = MonitorError::InvariantViolation {
                    file: file.to_string(),
                    detail: e.to_string(),
                };
                tracing::warn!(error = %err, "persisted state unreadable; treating as empty");
                T::default()
            }
        }
    }

    /// Load ahead of a rewrite. A corrupt document is renamed to `<file>.corrupt-<uuid>` and
    /// replaced by an empty one; a document that cannot be read at all is an error, so it is never
    /// overwritten.
    pub(crate) fn load_for_update<T: DeserializeOwned + Default>(
        &self,
        file: &str,
    ) -> anyhow::Result<T> {
        let Some(text) = self
            .read_text(file)
            .with_context(|| format!("read {file} failed"))?
        else {
            return Ok(T::default());
        };

        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(e) => {
                let aside = self
                    .dir
                    .join(format!("{file}.corrupt-{}", uuid::Uuid::new_v4().simple()));
                std::fs::rename(self.dir.join(file), &aside)
                    .with_context(|| format!("move corrupt {file} aside failed"))?;
                let err = MonitorError::InvariantViolation {
                    file: file.to_string(),
                    detail: e.to_string(),
                };
                tracing::warn!(
                    error = %err,
                    moved_to = %aside.display(),
                    "persisted state unreadable; moved aside, starting empty"
                );
                Ok(T::default())
            }
        }
    }

    pub(crate) fn save<T: Serialize>(&self, file: &str, value: &T) -> anyhow::Result<()> {
        let path = self.dir.join(file);
        let tmp = self
            .dir
            .join(format!(".{file}.{}.tmp", uuid::Uuid::new_v4().simple()));

        let bytes =
            serde_json::to_vec_pretty(value).with_context(|| format!("serialize {file} failed"))?;

        let written = (|| -> std::io::Result<()> {
            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
            std::fs::rename(&tmp, &path)
        })();

        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(anyhow::Error::new(e).context(format!("write {} failed", path.display())));
        }
        Ok(())
    }

    /// Load, mutate and persist a document while holding the store's write lock.
    pub(crate) fn update<T, R>(&self, file: &str, f: impl FnOnce(&mut T) -> R) -> anyhow::Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let _guard = self.lock();
        let mut value: T = self.load_for_update(file)?;
        let out = f(&mut value);
        self.save(file, &value)?;
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
