use thiserror::Error;

/// Failure taxonomy shared by the worker and the API.
///
/// Only `Configuration` is fatal, and only at startup. Everything else is scoped to one ticker,
/// one sub-check or one persisted file and must never abort a cycle.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("data unavailable for {ticker}: {detail}")]
    DataUnavailable { ticker: String, detail: String },

    #[error("transient I/O failure (stage={stage}): {detail}")]
    TransientIo { stage: &'static str, detail: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("corrupt persisted state in {file}: {detail}")]
    InvariantViolation { file: String, detail: String },
}

impl MonitorError {
    pub fn data_unavailable(ticker: &str, detail: impl Into<String>) -> Self {
        Self::DataUnavailable {
            ticker: ticker.to_string(),
            detail: detail.into(),
        }
    }

    pub fn transient(stage: &'static str, detail: impl std::fmt::Display) -> Self {
        Self::TransientIo {
            stage,
            detail: detail.to_string(),
        }
    }

    /// True for routine absence (no quote, no NAV) as opposed to a real failure.
    pub fn is_routine(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<MonitorError>(),
            Some(MonitorError::DataUnavailable { .. })
        )
    }
}
