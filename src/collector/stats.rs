//! Counters describing serial bridge activity.
//!
//! Serial faults are absorbed inside the bridge; these counters are the
//! only place they become visible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Live bridge statistics.
#[derive(Debug)]
pub struct BridgeStats {
    /// Attempts to open the serial endpoint
    connection_attempts: AtomicU64,
    /// Attempts that produced an open port
    connections: AtomicU64,
    /// Frames published to the shared slot
    frames_published: AtomicU64,
    /// Non-blank lines that failed the frame filter or parse
    lines_discarded: AtomicU64,
    /// Read failures that dropped the connection
    io_failures: AtomicU64,
    /// Sampler reads answered with synthetic data
    simulated_reads: AtomicU64,
    /// Whether a port is currently open
    connected: AtomicBool,
    /// Time of the last published frame
    last_frame_at: Mutex<Option<DateTime<Utc>>>,
    /// Time the statistics started
    started_at: DateTime<Utc>,
}

impl BridgeStats {
    pub fn new() -> Self {
        Self {
            connection_attempts: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            frames_published: AtomicU64::new(0),
            lines_discarded: AtomicU64::new(0),
            io_failures: AtomicU64::new(0),
            simulated_reads: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            last_frame_at: Mutex::new(None),
            started_at: Utc::now(),
        }
    }

    pub fn record_connection_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connected(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
        self.connected.store(true, Ordering::Relaxed);
    }

    pub fn record_disconnected(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        let mut last = self
            .last_frame_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(Utc::now());
    }

    pub fn record_discarded_line(&self) {
        self.lines_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_io_failure(&self) {
        self.io_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_simulated_read(&self) {
        self.simulated_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of the counters.
    pub fn snapshot(&self) -> BridgeSnapshot {
        let last_frame_at = *self
            .last_frame_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        BridgeSnapshot {
            connected: self.connected.load(Ordering::Relaxed),
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            lines_discarded: self.lines_discarded.load(Ordering::Relaxed),
            io_failures: self.io_failures.load(Ordering::Relaxed),
            simulated_reads: self.simulated_reads.load(Ordering::Relaxed),
            last_frame_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Serial Bridge Statistics:\n\
             - Connected: {}\n\
             - Connection attempts: {} ({} succeeded)\n\
             - Frames received: {}\n\
             - Lines discarded: {}\n\
             - Read failures: {}\n\
             - Simulated reads: {}",
            stats.connected,
            stats.connection_attempts,
            stats.connections,
            stats.frames_published,
            stats.lines_discarded,
            stats.io_failures,
            stats.simulated_reads
        )
    }
}

impl Default for BridgeStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable copy of the bridge counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSnapshot {
    pub connected: bool,
    pub connection_attempts: u64,
    pub connections: u64,
    pub frames_published: u64,
    pub lines_discarded: u64,
    pub io_failures: u64,
    pub simulated_reads: u64,
    pub last_frame_at: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
}

/// Thread-safe shared bridge statistics.
pub type SharedBridgeStats = Arc<BridgeStats>;

/// Create a new shared statistics handle.
pub fn create_shared_stats() -> SharedBridgeStats {
    Arc::new(BridgeStats::new())
}
