/*!
 * Tick Source
 * Monotonic counter consumed from the external timer
 *
 * The authoritative counter lives under its own mutex so timed sleeps can
 * use it as their sleep lock, exactly like sleeping on the tick counter
 * while holding its spinlock. Accounting paths read a lock-free mirror
 * instead: nesting the tick mutex under a record lock would invert the
 * order against the timed-sleep path on a second CPU.
 */

use crate::core::types::Tick;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Clock {
    ticks: Mutex<Tick>,
    mirror: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            ticks: Mutex::new(0),
            mirror: AtomicU64::new(0),
        }
    }

    /// Current tick count. Safe to call with any lock held.
    pub fn now(&self) -> Tick {
        self.mirror.load(Ordering::Acquire)
    }

    /// Advance the counter by one tick; returns the new value.
    pub(crate) fn advance(&self) -> Tick {
        let mut ticks = self.ticks.lock();
        *ticks += 1;
        self.mirror.store(*ticks, Ordering::Release);
        *ticks
    }

    /// The mutex timed sleeps block under (the tick channel's sleep lock).
    pub(crate) fn mutex(&self) -> &Mutex<Tick> {
        &self.ticks
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
