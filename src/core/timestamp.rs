//! Timestamp parsing and canonical formatting.

use crate::core::error::SessionError;
use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, SubsecRound, Utc};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Years representable in the four-digit stored form.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

/// Current time at storage precision (microseconds).
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Parse a client-supplied timestamp, or take the current time when absent.
///
/// Accepts RFC 3339 / ISO 8601 date-times. A trailing `Z` is read as
/// `+00:00`; a value without any offset is taken as UTC. Sub-microsecond
/// digits are dropped. The UTC year must fit in four digits.
pub fn parse_timestamp(value: Option<&str>) -> Result<DateTime<Utc>, SessionError> {
    let parsed = parse_raw(value)?.trunc_subsecs(6);
    if !YEAR_RANGE.contains(&parsed.year()) {
        return Err(SessionError::Validation(format!(
            "timestamp year {} is outside 0000-9999",
            parsed.year()
        )));
    }
    Ok(parsed)
}

fn parse_raw(value: Option<&str>) -> Result<DateTime<Utc>, SessionError> {
    let raw = match value.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(Utc::now()),
    };

    let normalized = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        Some(head) => format!("{head}+00:00"),
        None => raw.to_string(),
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(&normalized, &format!("{format}%:z")) {
            return Ok(parsed.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(SessionError::Validation(format!("invalid timestamp '{raw}'")))
}

/// Canonical storage and wire form: UTC with microseconds and explicit offset.
///
/// The fixed width keeps lexical order equal to chronological order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Serde adapter emitting [`format_timestamp`] strings.
pub mod wire {
    use super::format_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    /// Same format for optional timestamps; `None` is `null`.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    DateTime::parse_from_rfc3339(&raw)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_z_suffix_equals_utc_offset() {
        let z = parse_timestamp(Some("2025-03-01T10:00:00Z")).unwrap();
        let offset = parse_timestamp(Some("2025-03-01T10:00:00+00:00")).unwrap();
        assert_eq!(z, offset);
        assert_eq!(z, Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_offsets_are_normalized() {
        let parsed = parse_timestamp(Some("2025-03-01T07:00:00.250-03:00")).unwrap();
        assert_eq!(format_timestamp(&parsed), "2025-03-01T10:00:00.250000+00:00");
    }

    #[test]
    fn test_naive_is_utc() {
        let parsed = parse_timestamp(Some("2025-03-01 10:00:00")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_missing_uses_now() {
        let before = now_utc();
        let parsed = parse_timestamp(None).unwrap();
        assert!(parsed >= before);
        assert_eq!(parsed.timestamp_subsec_nanos() % 1_000, 0);
        assert!(parse_timestamp(Some("  ")).is_ok());
    }

    #[test]
    fn test_years_beyond_four_digits_are_rejected() {
        for raw in [
            "+10000-01-01T00:00:00Z",
            "-0001-01-01T00:00:00",
            "9999-12-31T23:00:00-05:00",
        ] {
            assert!(
                matches!(parse_timestamp(Some(raw)), Err(SessionError::Validation(_))),
                "{raw} should be rejected"
            );
        }

        let latest = parse_timestamp(Some("9999-12-31T23:59:59Z")).unwrap();
        assert_eq!(latest.year(), 9999);
    }

    #[test]
    fn test_nanoseconds_are_truncated() {
        let parsed = parse_timestamp(Some("2025-03-01T10:00:00.123456789Z")).unwrap();
        assert_eq!(parsed.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_garbage_is_validation_error() {
        assert!(matches!(
            parse_timestamp(Some("yesterday")),
            Err(SessionError::Validation(_))
        ));
    }
}
