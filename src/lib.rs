//! GaitVision Agent - plantar-pressure acquisition for gait rehabilitation.
//!
//! This library reads live pressure frames from a serial-attached insole,
//! records them into therapy sessions and derives the summary statistics
//! clinicians review.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      GaitVision Agent                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Serial    │──▶│ Frame Slot  │──▶│  Pressure   │       │
//! │  │   Bridge    │   │  (latest)   │   │  Sampler    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                    │              │
//! │         ▼                                    ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Bridge    │   │   SQLite    │◀──│  Session    │       │
//! │  │   Stats     │   │   Store     │   │ Aggregator  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gaitvision_agent::collector::{
//!     create_shared_slot, create_shared_stats, PressureSampler, SerialBridge, SerialConnector,
//!     SerialSettings,
//! };
//! use std::time::Duration;
//!
//! let slot = create_shared_slot();
//! let stats = create_shared_stats();
//!
//! let mut bridge = SerialBridge::new(slot.clone(), stats.clone(), Duration::from_secs(1));
//! bridge
//!     .start(SerialConnector::new(SerialSettings::default()))
//!     .expect("Failed to start bridge");
//!
//! let sampler = PressureSampler::new(slot, stats);
//! let reading = sampler.read(Duration::from_secs(3), true);
//! println!("{}: {:?}", reading.source(), reading.frame());
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use collector::{Frame, PressureSampler, Reading, SerialBridge, SerialConnector};
pub use config::{Config, ConfigError};
pub use core::{NewPatient, Region, SessionAggregator, SessionError, SessionSummary};
pub use store::Database;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
