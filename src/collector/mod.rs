//! Sensor collection for the GaitVision agent.
//!
//! A background [`SerialBridge`] keeps the latest insole frame in a shared
//! [`FrameSlot`]; request handlers read it through a [`PressureSampler`].

pub mod bridge;
pub mod sampler;
pub mod slot;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use bridge::{BridgeError, PortConnector, SerialBridge, SerialConnector, SerialSettings};
pub use sampler::{simulated_frame, PressureSampler, DEFAULT_READ_TIMEOUT, SIMULATED_CHANNELS};
pub use slot::{create_shared_slot, FrameSlot, SharedFrameSlot};
pub use stats::{create_shared_stats, BridgeSnapshot, BridgeStats, SharedBridgeStats};
pub use types::{parse_line, Frame, LineOutcome, Reading};
