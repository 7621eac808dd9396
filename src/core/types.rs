/*!
 * Core Types
 * Common types used across the kernel
 */

use std::sync::atomic::{AtomicU64, Ordering};

/// Process ID type. Non-zero for any live process; 0 means "unset".
pub type Pid = u32;

/// Monotonic tick count from the external tick source.
pub type Tick = u64;

/// Index of a slot in the process table.
pub type SlotId = usize;

/// Opaque rendezvous token a sleeping process waits on.
///
/// Tokens are plain integers carved into non-overlapping ranges: the tick
/// channel, one exit channel per table slot, and dynamically allocated
/// channels for condition variables. Two callers sleeping on the same token
/// rendezvous on the same wakeup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel(u64);

const CHANNEL_SLOT_BASE: u64 = 0x100;
const CHANNEL_DYN_BASE: u64 = 1 << 32;

static NEXT_CHANNEL: AtomicU64 = AtomicU64::new(CHANNEL_DYN_BASE);

impl Channel {
    /// The channel timed sleeps wait on; woken on every clock tick.
    pub const TICKS: Channel = Channel(1);

    /// The exit-notification channel of a table slot. A parent waiting for
    /// children sleeps on its own slot's channel; exiting children wake it.
    pub(crate) fn of_slot(slot: SlotId) -> Channel {
        Channel(CHANNEL_SLOT_BASE + slot as u64)
    }

    /// Allocate a process-wide-unique channel (used by condition variables).
    pub fn fresh() -> Channel {
        Channel(NEXT_CHANNEL.fetch_add(1, Ordering::Relaxed))
    }

    /// The underlying token, for diagnostics only.
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_channels_are_unique() {
        let a = Channel::fresh();
        let b = Channel::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn slot_channels_do_not_collide_with_ticks() {
        assert_ne!(Channel::of_slot(0), Channel::TICKS);
        assert_ne!(Channel::of_slot(0), Channel::of_slot(1));
    }
}
