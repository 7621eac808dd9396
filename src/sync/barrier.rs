/*!
 * Barrier Pool
 * Fixed pool of reusable n-party rendezvous barriers
 *
 * Each barrier counts arrivals under its own lock and releases everyone at
 * once via a per-barrier condition variable. A generation counter
 * distinguishes consecutive rounds, so a late sleeper from round k cannot
 * be confused with an early arrival of round k+1.
 */

use crate::core::errors::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::proc::ProcHandle;
use crate::sync::condvar::CondVar;
use log::debug;
use parking_lot::Mutex;

/// Number of barriers in the pool.
pub const NBARRIER: usize = 10;

struct BarrierState {
    arrived: usize,
    generation: u64,
}

struct BarrierSlot {
    state: Mutex<Option<BarrierState>>,
    cv: CondVar,
}

pub struct BarrierPool {
    slots: [BarrierSlot; NBARRIER],
}

impl BarrierPool {
    pub(crate) fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| BarrierSlot {
                state: Mutex::new(None),
                cv: CondVar::new(),
            }),
        }
    }

    /// Claim a free barrier; returns its id or `NoFreeBarrier`.
    pub fn alloc(&self) -> KernelResult<usize> {
        for (id, slot) in self.slots.iter().enumerate() {
            let mut state = slot.state.lock();
            if state.is_none() {
                *state = Some(BarrierState {
                    arrived: 0,
                    generation: 0,
                });
                return Ok(id);
            }
        }
        Err(KernelError::NoFreeBarrier)
    }

    /// Arrive at barrier `id` expecting `parties` participants in this
    /// round. Blocks until all have arrived; the last arrival releases the
    /// round and resets the barrier for reuse. `round` is caller-side
    /// bookkeeping carried into the log.
    pub fn arrive(
        &self,
        proc: &ProcHandle,
        round: u64,
        id: usize,
        parties: usize,
    ) -> KernelResult<()> {
        let slot = self
            .slots
            .get(id)
            .ok_or(KernelError::InvalidArgument("barrier id out of range"))?;
        let mut state = slot.state.lock();
        let inner = state
            .as_mut()
            .ok_or(KernelError::InvalidArgument("barrier not allocated"))?;

        inner.arrived += 1;
        debug!(
            "pid {} at barrier {} round {}: {}/{}",
            proc.pid(),
            id,
            round,
            inner.arrived,
            parties
        );
        if inner.arrived >= parties {
            inner.arrived = 0;
            inner.generation += 1;
            drop(state);
            slot.cv.broadcast(proc.kernel());
            return Ok(());
        }

        let generation = inner.generation;
        let mut guard = state;
        while guard
            .as_ref()
            .is_some_and(|inner| inner.generation == generation)
        {
            guard = slot.cv.wait(proc, &slot.state, guard);
            if proc.killed() {
                return Err(KernelError::Killed);
            }
        }
        Ok(())
    }

    /// Return barrier `id` to the pool. Any process still blocked on it is
    /// released (its round can no longer complete).
    pub fn free(&self, kernel: &Kernel, id: usize) -> KernelResult<()> {
        let slot = self
            .slots
            .get(id)
            .ok_or(KernelError::InvalidArgument("barrier id out of range"))?;
        let mut state = slot.state.lock();
        if state.take().is_none() {
            return Err(KernelError::InvalidArgument("barrier not allocated"));
        }
        drop(state);
        slot.cv.broadcast(kernel);
        Ok(())
    }
}
