/*!
 * Condition Variable
 * A fresh sleep channel plus signal/broadcast over it
 */

use crate::core::types::Channel;
use crate::kernel::Kernel;
use crate::proc::ProcHandle;
use parking_lot::{Mutex, MutexGuard};

/// Kernel-process condition variable.
///
/// `wait` can return spuriously (a kill forces an early wakeup), so callers
/// always loop on their predicate.
pub struct CondVar {
    chan: Channel,
}

impl CondVar {
    pub fn new() -> Self {
        Self {
            chan: Channel::fresh(),
        }
    }

    /// Atomically release `guard`, sleep, and reacquire `lock`.
    pub fn wait<'a, T>(
        &self,
        proc: &ProcHandle,
        lock: &'a Mutex<T>,
        guard: MutexGuard<'a, T>,
    ) -> MutexGuard<'a, T> {
        proc.sleep_on(self.chan, lock, guard)
    }

    /// Wake one waiter; returns how many were woken (0 or 1).
    pub fn signal(&self, kernel: &Kernel) -> usize {
        kernel.wakeup_one(self.chan)
    }

    /// Wake every waiter; returns how many were woken.
    pub fn broadcast(&self, kernel: &Kernel) -> usize {
        kernel.wakeup(self.chan)
    }
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}
