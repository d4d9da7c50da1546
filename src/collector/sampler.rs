//! On-demand access to the latest sensor frame.

use crate::collector::slot::SharedFrameSlot;
use crate::collector::stats::SharedBridgeStats;
use crate::collector::types::{Frame, Reading};
use rand::Rng;
use std::time::Duration;

/// Number of channels in a synthetic frame (six per insole).
pub const SIMULATED_CHANNELS: usize = 12;

/// Upper bound of the sensor voltage range.
pub const MAX_VOLTAGE: f64 = 5.0;

/// Default wait for a fresh frame.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Hands out the latest bridge frame with a bounded wait.
#[derive(Clone)]
pub struct PressureSampler {
    slot: SharedFrameSlot,
    stats: SharedBridgeStats,
}

impl PressureSampler {
    pub fn new(slot: SharedFrameSlot, stats: SharedBridgeStats) -> Self {
        Self { slot, stats }
    }

    pub fn stats(&self) -> &SharedBridgeStats {
        &self.stats
    }

    /// Wait up to `timeout` for a frame published since the previous read.
    ///
    /// Blocks the calling thread. A missing or disconnected device is not
    /// an error: the result is either a simulated frame or
    /// [`Reading::Unavailable`].
    pub fn read(&self, timeout: Duration, allow_fallback: bool) -> Reading {
        if let Some(frame) = self.slot.take_fresh(timeout) {
            return Reading::Live(frame);
        }

        if allow_fallback {
            self.stats.record_simulated_read();
            Reading::Simulated(simulated_frame())
        } else {
            Reading::Unavailable
        }
    }
}

/// Build a frame of uniformly random voltages on `fsr0`..`fsr11`.
pub fn simulated_frame() -> Frame {
    let mut rng = rand::thread_rng();
    (0..SIMULATED_CHANNELS)
        .map(|i| {
            let volts: f64 = rng.gen_range(0.0..=MAX_VOLTAGE);
            (format!("fsr{i}"), volts.clamp(0.0, MAX_VOLTAGE))
        })
        .collect()
}
