/*!
 * Sleep and Wakeup
 * Channel-based blocking over the process table
 */

use crate::core::types::{Channel, SlotId};
use crate::kernel::Kernel;
use crate::proc::types::ProcState;
use parking_lot::{Mutex, MutexGuard};

impl Kernel {
    /// Atomically release `guard`, sleep on `chan`, and reacquire the lock.
    ///
    /// The record lock is taken before the caller's lock is released, and
    /// wakeups lock the record before testing state, so a wakeup racing
    /// this call is either observed or arrives after the record is already
    /// Sleeping; either way it is not lost. Callers must re-check their
    /// wait predicate on return: wakeups can be spurious when channels
    /// collide, and a kill forces an early return.
    pub(crate) fn sleep_on<'a, T>(
        &self,
        me: SlotId,
        chan: Channel,
        lock: &'a Mutex<T>,
        guard: MutexGuard<'a, T>,
    ) -> MutexGuard<'a, T> {
        let slot = self.table.slot(me);
        let mut rec = slot.inner.lock();
        drop(guard);

        assert_eq!(rec.state, ProcState::Running, "sleep from non-running process");
        rec.chan = Some(chan);
        rec.cpu_usage += self.cfg.cpu_charge / 2;
        rec.state = ProcState::Sleeping;
        rec.last_stop = self.clock.now();

        slot.give_up_cpu(&mut rec);

        rec.chan = None;
        drop(rec);
        lock.lock()
    }

    /// Wake every process sleeping on `chan`. Must not be called while
    /// holding the caller's own record lock.
    pub fn wakeup(&self, chan: Channel) -> usize {
        self.wake_matching(chan, usize::MAX)
    }

    /// Wake at most one process sleeping on `chan` (first in table order).
    pub fn wakeup_one(&self, chan: Channel) -> usize {
        self.wake_matching(chan, 1)
    }

    fn wake_matching(&self, chan: Channel, limit: usize) -> usize {
        let mut woken = 0;
        for slot in self.table.slots() {
            let mut rec = slot.inner.lock();
            if rec.state == ProcState::Sleeping && rec.chan == Some(chan) {
                rec.state = ProcState::Runnable;
                rec.enqueued_at = self.clock.now();
                woken += 1;
                if woken == limit {
                    break;
                }
            }
        }
        woken
    }
}
