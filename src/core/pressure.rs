//! Voltage to pressure conversion and the anatomical region map.

use crate::collector::Frame;
use serde::{Deserialize, Serialize};

/// Channels that contribute to peak and regional pressure.
pub const MONITORED_CHANNELS: [&str; 7] = ["fsr0", "fsr1", "fsr2", "fsr3", "fsr4", "fsr5", "fsr6"];

/// Convert a sensor voltage to kPa: `100 * v^1.5`, with negatives clamped to 0.
pub fn volts_to_kpa(volts: f64) -> f64 {
    // f64::max also maps NaN to 0.
    100.0 * volts.max(0.0).powf(1.5)
}

/// Derived pressure of one channel; a missing channel reads as 0 V.
pub fn channel_kpa(frame: &Frame, channel: &str) -> f64 {
    volts_to_kpa(frame.get(channel).copied().unwrap_or(0.0))
}

/// Highest derived pressure across the monitored channels of a frame.
pub fn frame_peak_kpa(frame: &Frame) -> f64 {
    MONITORED_CHANNELS
        .iter()
        .map(|channel| channel_kpa(frame, channel))
        .fold(0.0, f64::max)
}

/// Anatomical zone of the plantar surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Heel,
    Midfoot,
    Toe,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Heel, Region::Midfoot, Region::Toe];

    /// Channels wired under this region.
    pub fn channels(self) -> &'static [&'static str] {
        match self {
            Region::Heel => &["fsr5", "fsr6"],
            Region::Midfoot => &["fsr2", "fsr3", "fsr4"],
            Region::Toe => &["fsr0", "fsr1"],
        }
    }

    /// Mean derived pressure over this region's channels for one frame.
    pub fn mean_kpa(self, frame: &Frame) -> f64 {
        let channels = self.channels();
        if channels.is_empty() {
            return 0.0;
        }
        let total: f64 = channels.iter().map(|c| channel_kpa(frame, c)).sum();
        total / channels.len() as f64
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
