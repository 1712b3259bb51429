//! Per-cycle alert composition, content fingerprinting and the duplicate-suppression gate.

use crate::domain::finding::{Finding, FindingKind};
use crate::notify::Notifier;
use crate::storage::JsonStore;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

pub const RISK_ALERT_SUBJECT: &str = "ETF Risk Alert";
pub const AUM_ALERT_SUBJECT: &str = "ETF AUM Risk Alert";

const NAV_DECLINE_RECOMMENDATION: &str = "Recommendation: Review fund health. Significant NAV decline \
could signal asset weakness. Consider reducing exposure if trend persists.";
const VOLUME_RECOMMENDATION: &str = "Recommendation: Monitor liquidity. Falling volume could make \
selling harder or indicate falling investor interest.";

/// Joins all non-empty findings with a blank line and appends the matching recommendation
/// paragraphs. `None` when there is nothing to say; an empty notification is never produced.
pub fn compose(findings: &[Finding]) -> Option<String> {
    let parts: Vec<&str> = findings
        .iter()
        .map(|f| f.message.trim())
        .filter(|m| !m.is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }

    let mut body = parts.join("\n\n");
    for recommendation in recommendations(findings) {
        body.push_str("\n\n");
        body.push_str(recommendation);
    }
    Some(body)
}

fn recommendations(findings: &[Finding]) -> Vec<&'static str> {
    let has = |pred: fn(FindingKind) -> bool| findings.iter().any(|f| pred(f.kind));

    let mut out = Vec::new();
    if has(|k| matches!(k, FindingKind::NavDecay | FindingKind::NavErosion)) {
        out.push(NAV_DECLINE_RECOMMENDATION);
    }
    if has(|k| k == FindingKind::VolumeCollapse) {
        out.push(VOLUME_RECOMMENDATION);
    }
    out
}

/// SHA-256 of the exact body text, lowercase hex.
pub fn fingerprint(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// Suppresses re-sending identical alert content within a window.
#[derive(Debug, Clone, Copy)]
pub struct DedupGate<'a> {
    store: &'a JsonStore,
    window: Duration,
}

impl<'a> DedupGate<'a> {
    pub fn new(store: &'a JsonStore, window: Duration) -> Self {
        Self { store, window }
    }

    /// `true` at most once per fingerprint per window. A `true` answer has already been recorded.
    pub fn should_send(&self, fingerprint: &str, now: DateTime<Utc>) -> anyhow::Result<bool> {
        self.store.claim_alert_slot(fingerprint, now, self.window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Suppressed,
    Failed,
}

/// Gate and send one composed alert. Never returns an error: every failure is logged.
pub async fn dispatch(
    gate: &DedupGate<'_>,
    notifier: &dyn Notifier,
    subject: &str,
    body: &str,
    now: DateTime<Utc>,
) -> DispatchOutcome {
    let fingerprint = fingerprint(body);

    match gate.should_send(&fingerprint, now) {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(subject, %fingerprint, "duplicate alert suppressed");
            return DispatchOutcome::Suppressed;
        }
        Err(err) => {
            // Fail open: an unrecorded send may repeat next cycle.
            tracing::warn!(subject, %fingerprint, error = %err, "dedup record write failed; sending anyway");
        }
    }

    match notifier.send(subject, body).await {
        Ok(()) => {
            tracing::info!(subject, %fingerprint, channel = ?notifier.channel(), "alert dispatched");
            DispatchOutcome::Sent
        }
        Err(err) => {
            tracing::warn!(subject, %fingerprint, error = %err, "alert dispatch failed");
            DispatchOutcome::Failed
        }
    }
}
