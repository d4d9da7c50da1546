//! Session summaries recomputed from stored samples.

use crate::collector::Frame;
use crate::core::pressure::{round2, Region};
use crate::core::timestamp::wire;
use crate::store::{SampleRecord, SessionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Clinician-facing view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub patient_id: String,
    pub note: Option<String>,
    #[serde(with = "wire")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "wire::option", default)]
    pub end_time: Option<DateTime<Utc>>,
    pub sample_count: u64,
    pub max_pressure_kpa: f64,
    pub duration_seconds: Option<f64>,
    pub region_averages: BTreeMap<Region, f64>,
}

/// Summary plus the raw samples, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub samples: Vec<SampleView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleView {
    #[serde(with = "wire")]
    pub timestamp: DateTime<Utc>,
    pub pressures: Frame,
}

impl From<&SampleRecord> for SampleView {
    fn from(sample: &SampleRecord) -> Self {
        Self {
            timestamp: sample.timestamp,
            pressures: sample.frame.clone(),
        }
    }
}

/// Build the summary of `session` from all of its stored samples.
///
/// Peak pressure and sample count come from the session's running
/// counters; region averages are recomputed on every call.
pub fn summarize(session: &SessionRecord, samples: &[SampleRecord]) -> SessionSummary {
    let sample_count = if session.sample_count != 0 {
        session.sample_count
    } else {
        samples.len() as u64
    };

    SessionSummary {
        id: session.id.clone(),
        patient_id: session.patient_id.clone(),
        note: session.note.clone(),
        start_time: session.start_time,
        end_time: session.end_time,
        sample_count,
        max_pressure_kpa: round2(session.max_pressure_kpa),
        duration_seconds: duration_seconds(session.start_time, session.end_time),
        region_averages: region_averages(samples),
    }
}

/// Mean over samples of each region's per-sample mean pressure.
pub fn region_averages(samples: &[SampleRecord]) -> BTreeMap<Region, f64> {
    Region::ALL
        .iter()
        .map(|&region| {
            let average = if samples.is_empty() {
                0.0
            } else {
                let per_sample: Vec<f64> =
                    samples.iter().map(|s| region.mean_kpa(&s.frame)).collect();
                round2(per_sample.iter().mean())
            };
            (region, average)
        })
        .collect()
}

fn duration_seconds(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Option<f64> {
    let elapsed = end? - start;
    let seconds = match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => elapsed.num_milliseconds() as f64 / 1000.0,
    };
    Some(round2(seconds))
}

pub fn detail(session: &SessionRecord, samples: &[SampleRecord]) -> SessionDetail {
    SessionDetail {
        summary: summarize(session, samples),
        samples: samples.iter().map(SampleView::from).collect(),
    }
}
