//! Timestamps as persisted in the data directory.
//!
//! Files may also come from older writers that stored naive UTC (`2025-05-01T12:00:00.123456`);
//! those are read as UTC. Writes are always RFC 3339 with an offset.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, NAIVE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// `deserialize_with` target for `DateTime<Utc>` fields.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw:?}")))
}

/// A `DateTime<Utc>` map value read with the same leniency as [`deserialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stamp(pub DateTime<Utc>);

impl Serialize for Stamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Stamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize(deserializer).map(Stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn reads_naive_iso_as_utc() {
        let dt = parse("2025-05-01T12:00:00.123456").unwrap();
        assert_eq!(dt.date_naive().to_string(), "2025-05-01");
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.nanosecond(), 123_456_000);

        assert_eq!(
            parse("2025-05-01T12:00:00"),
            Some(Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        assert_eq!(
            parse("2025-05-01T14:00:00+02:00"),
            Some(Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap())
        );
        assert!(parse("yesterday").is_none());
    }

    #[test]
    fn stamp_round_trips_through_rfc3339() {
        let stamp: Stamp = serde_json::from_str(r#""2025-05-01T12:00:00""#).unwrap();
        let text = serde_json::to_string(&stamp).unwrap();
        assert_eq!(text, r#""2025-05-01T12:00:00Z""#);
    }
}
