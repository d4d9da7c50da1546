//! Core session logic for the GaitVision agent.
//!
//! This module contains:
//! - Voltage to pressure derivation and the foot region map
//! - Patient and note validation
//! - Session summaries recomputed from stored samples
//! - The [`SessionAggregator`] that ties them to the store

pub mod aggregator;
pub mod error;
pub mod patients;
pub mod pressure;
pub mod summary;
pub mod timestamp;

// Re-export commonly used types
pub use aggregator::SessionAggregator;
pub use error::SessionError;
pub use patients::{validate_note, NewPatient, ValidPatient};
pub use pressure::{frame_peak_kpa, volts_to_kpa, Region, MONITORED_CHANNELS};
pub use summary::{SampleView, SessionDetail, SessionSummary};
pub use timestamp::{format_timestamp, now_utc, parse_timestamp};
