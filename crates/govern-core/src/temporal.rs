//! # Temporal Types
//!
//! UTC-only timestamp type. Receipts carry microsecond precision with a `Z`
//! suffix in serialized form, e.g. `2026-01-15T12:00:00.123456Z`.
//!
//! Precision is truncated at construction rather than at serialization, so a
//! timestamp that round-trips through the receipt log compares equal to the
//! one that was signed.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// A UTC timestamp truncated to microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current UTC time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Wrap a `chrono::DateTime<Utc>`, dropping sub-microsecond digits.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let micros_only = (dt.nanosecond() / 1_000) * 1_000;
        Self(dt.with_nanosecond(micros_only).unwrap_or(dt))
    }

    /// Parse an RFC 3339 string. Offsets other than `Z` are converted to UTC.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self::from_datetime(dt.with_timezone(&Utc)))
            .map_err(|e| ValidationError::InvalidTimestamp {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }

    /// Access the underlying `chrono::DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// ISO 8601 with six fractional digits and `Z` suffix.
    pub fn to_canonical_string(&self) -> String {
        self.0.format(CANONICAL_FORMAT).to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

impl std::str::FromStr for Timestamp {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn truncates_to_microseconds() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let ts = Timestamp::from_datetime(dt);
        assert_eq!(ts.as_datetime().nanosecond(), 123_456_000);
        assert_eq!(ts.to_canonical_string(), "2026-01-15T12:00:00.123456Z");
    }

    #[test]
    fn serde_round_trip_is_exact() {
        let ts = Timestamp::now();
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, back);
    }

    #[test]
    fn parse_converts_offsets_to_utc() {
        let ts = Timestamp::parse("2026-01-15T14:00:00+02:00").unwrap();
        assert_eq!(ts.to_canonical_string(), "2026-01-15T12:00:00.000000Z");
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = Timestamp::parse("yesterday").unwrap_err();
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn ordering_follows_time() {
        let a = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        let b = Timestamp::parse("2026-01-01T00:00:00.000001Z").unwrap();
        assert!(a < b);
    }
}
