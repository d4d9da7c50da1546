//! Row models for the session store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::Frame;
use crate::core::timestamp::wire;

/// Clinician owning patients; a single default row in this deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct Clinician {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    #[serde(skip)]
    pub clinician_id: String,
    pub name: String,
    pub identifier: Option<String>,
    pub age: Option<u32>,
    #[serde(with = "wire")]
    pub created_at: DateTime<Utc>,
}

/// Stored session with its running statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub patient_id: String,
    pub clinician_id: String,
    pub note: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub sample_count: u64,
    pub max_pressure_kpa: f64,
}

impl SessionRecord {
    /// A session is open until its end time is set.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// One stored frame, kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub frame: Frame,
}
