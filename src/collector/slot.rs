//! Single-slot cell holding the most recent frame.
//!
//! One writer (the bridge thread) replaces the value; any number of
//! readers wait on a freshness flag. Only the latest value is kept.

use crate::collector::types::Frame;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct SlotState {
    latest: Option<Frame>,
    fresh: bool,
}

/// Latest-value cell with a "new data" signal.
#[derive(Debug, Default)]
pub struct FrameSlot {
    state: Mutex<SlotState>,
    signal: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the stored frame and wake every waiter.
    pub fn publish(&self, frame: Frame) {
        {
            let mut state = self.lock();
            state.latest = Some(frame);
            state.fresh = true;
        }
        self.signal.notify_all();
    }

    /// Wait up to `timeout` for a frame published since the last take.
    ///
    /// On success the freshness flag is cleared but the value stays in the
    /// slot, so a following call waits again instead of returning the same
    /// frame immediately.
    pub fn take_fresh(&self, timeout: Duration) -> Option<Frame> {
        let guard = self.lock();
        let (mut state, _) = self
            .signal
            .wait_timeout_while(guard, timeout, |state| !state.fresh)
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !state.fresh {
            return None;
        }
        let frame = state.latest.clone()?;
        state.fresh = false;
        Some(frame)
    }

    /// Copy of the stored frame regardless of freshness.
    pub fn peek(&self) -> Option<Frame> {
        self.lock().latest.clone()
    }

    /// Whether a frame has been published and not yet taken.
    pub fn is_fresh(&self) -> bool {
        self.lock().fresh
    }
}

/// Thread-safe shared frame slot.
pub type SharedFrameSlot = Arc<FrameSlot>;

/// Create a new shared frame slot.
pub fn create_shared_slot() -> SharedFrameSlot {
    Arc::new(FrameSlot::new())
}
