//! Wire types for the insole serial link.
//!
//! The microcontroller emits one JSON object per line, mapping channel
//! names (`fsr0`, `fsr1`, ...) to voltages in the 0-5 V range.

use serde_json::Value;
use std::collections::BTreeMap;

/// One reading of the sensor array: channel name to voltage.
pub type Frame = BTreeMap<String, f64>;

/// Result of inspecting one line received from the serial link.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// A well-formed object frame.
    Frame(Frame),
    /// Empty or whitespace-only line.
    Blank,
    /// Anything that is not a JSON object framed by braces.
    Discarded,
}

/// Classify a raw serial line.
///
/// Bytes are decoded lossily so a corrupted byte never stops the reader.
/// Lines are pre-filtered on their first and last characters before the
/// JSON parser is invoked. Non-numeric members of an otherwise valid
/// object are dropped rather than failing the whole frame.
pub fn parse_line(raw: &[u8]) -> LineOutcome {
    let decoded = String::from_utf8_lossy(raw);
    let line = decoded.trim();

    if line.is_empty() {
        return LineOutcome::Blank;
    }
    if !(line.starts_with('{') && line.ends_with('}')) {
        return LineOutcome::Discarded;
    }

    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(members)) => LineOutcome::Frame(
            members
                .into_iter()
                .filter_map(|(channel, value)| value.as_f64().map(|v| (channel, v)))
                .collect(),
        ),
        _ => LineOutcome::Discarded,
    }
}

/// Outcome of a sampler read.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// A frame published by the serial bridge since the previous read.
    Live(Frame),
    /// A synthetic frame produced because no fresh data arrived in time.
    Simulated(Frame),
    /// No fresh data and simulation was not allowed.
    Unavailable,
}

impl Reading {
    /// Short label describing where the frame came from.
    pub fn source(&self) -> &'static str {
        match self {
            Reading::Live(_) => "live",
            Reading::Simulated(_) => "simulated",
            Reading::Unavailable => "unavailable",
        }
    }

    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Reading::Live(frame) | Reading::Simulated(frame) => Some(frame),
            Reading::Unavailable => None,
        }
    }

    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Reading::Live(frame) | Reading::Simulated(frame) => Some(frame),
            Reading::Unavailable => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_frame() {
        let outcome = parse_line(b"{\"fsr0\": 1.5, \"fsr1\": 0}\r\n");
        let LineOutcome::Frame(frame) = outcome else {
            panic!("expected frame, got {outcome:?}");
        };
        assert_eq!(frame.len(), 2);
        assert_eq!(frame["fsr0"], 1.5);
        assert_eq!(frame["fsr1"], 0.0);
    }

    #[test]
    fn test_blank_and_unbounded_lines() {
        assert_eq!(parse_line(b"   \r\n"), LineOutcome::Blank);
        assert_eq!(parse_line(b"booting sensor array"), LineOutcome::Discarded);
        assert_eq!(parse_line(b"{\"fsr0\": 1.0"), LineOutcome::Discarded);
    }

    #[test]
    fn test_malformed_json_is_discarded() {
        assert_eq!(parse_line(b"{fsr0: 1.0}"), LineOutcome::Discarded);
        assert_eq!(parse_line(b"{\"a\": 1} {\"b\": 2}"), LineOutcome::Discarded);
    }

    #[test]
    fn test_invalid_utf8_does_not_abort() {
        let outcome = parse_line(b"{\"fsr2\": 3.25, \"x\xff\": 1}");
        let LineOutcome::Frame(frame) = outcome else {
            panic!("expected frame, got {outcome:?}");
        };
        assert_eq!(frame["fsr2"], 3.25);
    }

    #[test]
    fn test_non_numeric_members_dropped() {
        let outcome = parse_line(b"{\"fsr0\": 2.0, \"status\": \"ok\"}");
        let LineOutcome::Frame(frame) = outcome else {
            panic!("expected frame, got {outcome:?}");
        };
        assert_eq!(frame.len(), 1);
        assert!(frame.contains_key("fsr0"));
    }

    #[test]
    fn test_reading_accessors() {
        let mut frame = Frame::new();
        frame.insert("fsr0".to_string(), 1.0);

        assert_eq!(Reading::Live(frame.clone()).source(), "live");
        assert_eq!(Reading::Simulated(frame.clone()).frame(), Some(&frame));
        assert_eq!(Reading::Unavailable.into_frame(), None);
    }
}
