/*!
 * Scheduler Core
 * Per-CPU dispatch loops for the four policies, plus run accounting
 *
 * Selection deliberately rescans the table in fixed slot order instead of
 * keeping priority queues: table sizes are small and the scan order is the
 * tie-break contract the policies and tests rely on.
 */

use crate::core::types::SlotId;
use crate::kernel::Kernel;
use crate::proc::table::{ProcRecord, Slot};
use crate::proc::types::{Policy, ProcState};
use log::{info, trace};
use parking_lot::MutexGuard;
use std::sync::Arc;

/// Next burst estimate by exponential smoothing with alpha = num/den:
/// `(1 - alpha) * measured + alpha * previous`, in the same integer
/// arithmetic the accounting uses.
pub(crate) fn next_burst_estimate(measured: u64, previous: u64, alpha: (u64, u64)) -> u64 {
    let (num, den) = alpha;
    measured - num * measured / den + num * previous / den
}

/// Per-CPU scheduler loop. Each CPU thread calls this once at boot; it
/// returns only on kernel shutdown. The policy cell is re-read every
/// iteration, so policy swaps take effect at the next dispatch.
pub(crate) fn scheduler_loop(kernel: Arc<Kernel>, cpu: usize) {
    info!("cpu {}: scheduler online", cpu);
    while !kernel.is_shutdown() {
        match kernel.policy() {
            Policy::Fcfs | Policy::RoundRobin => kernel.sched_fcfs_rr(cpu),
            Policy::Sjf => kernel.sched_sjf(cpu),
            Policy::Unix => kernel.sched_unix(cpu),
        }
    }
    info!("cpu {}: scheduler offline", cpu);
}

impl Kernel {
    /// Combined FCFS / round-robin scan. Runs the first Runnable record in
    /// slot order. Under round-robin the scan keeps going, which rotates
    /// because a dispatched record leaves Runnable until re-enqueued; under
    /// FCFS each run returns to the outer dispatcher (one dispatch per
    /// call), so policy swaps take effect between runs.
    fn sched_fcfs_rr(&self, cpu: usize) {
        loop {
            if self.is_shutdown() {
                return;
            }
            let mut dispatched = false;
            for (id, slot) in self.table.slots().iter().enumerate() {
                let mut rec = slot.inner.lock();
                if rec.state == ProcState::Runnable && !rec.on_cpu {
                    self.run_process(cpu, id, slot, &mut rec);
                    dispatched = true;
                    if self.policy() != Policy::RoundRobin {
                        return;
                    }
                }
            }
            if !dispatched {
                // Idle fallback: spin politely until a wakeup arrives.
                std::thread::yield_now();
            }
        }
    }

    /// Non-preemptive shortest-job-first: one dispatch per call. Batch jobs
    /// compete on the smoothed burst estimate (missing estimate wins);
    /// interactive jobs never compete and dispatch immediately.
    fn sched_sjf(&self, cpu: usize) {
        let mut best: Option<(SlotId, u64)> = None;
        for (id, slot) in self.table.slots().iter().enumerate() {
            let mut rec = slot.inner.lock();
            if rec.state != ProcState::Runnable || rec.on_cpu {
                continue;
            }
            if !rec.is_batch {
                self.run_process(cpu, id, slot, &mut rec);
                return;
            }
            match best {
                Some((_, est)) if rec.burst_est >= est => {}
                _ => best = Some((id, rec.burst_est)),
            }
        }
        match best {
            Some((id, _)) => self.dispatch_if_still_runnable(cpu, id),
            None => std::thread::yield_now(),
        }
    }

    /// Preemptive UNIX multilevel feedback: age every Runnable record's
    /// usage counter, then dispatch the minimum of
    /// `base_priority + cpu_usage / 2`; ties go to the lower slot.
    /// Interactive jobs dispatch immediately.
    fn sched_unix(&self, cpu: usize) {
        for slot in self.table.slots() {
            let mut rec = slot.inner.lock();
            if rec.state == ProcState::Runnable {
                rec.cpu_usage /= 2;
            }
        }

        let mut best: Option<(SlotId, i64)> = None;
        for (id, slot) in self.table.slots().iter().enumerate() {
            let mut rec = slot.inner.lock();
            if rec.state != ProcState::Runnable || rec.on_cpu {
                continue;
            }
            if !rec.is_batch {
                self.run_process(cpu, id, slot, &mut rec);
                return;
            }
            let rank = rec.base_priority + (rec.cpu_usage / 2) as i64;
            match best {
                Some((_, r)) if rank >= r => {}
                _ => best = Some((id, rank)),
            }
        }
        match best {
            Some((id, _)) => self.dispatch_if_still_runnable(cpu, id),
            None => std::thread::yield_now(),
        }
    }

    /// Relock the chosen slot and dispatch unless another CPU got there
    /// first while the selection scan held no lock on it.
    fn dispatch_if_still_runnable(&self, cpu: usize, id: SlotId) {
        let slot = self.table.slot(id);
        let mut rec = slot.inner.lock();
        if rec.state == ProcState::Runnable && !rec.on_cpu {
            self.run_process(cpu, id, slot, &mut rec);
        }
    }

    /// Run one slice of a Runnable record: dispatch-side accounting, the
    /// context handoff, and burst bookkeeping once control returns.
    ///
    /// `on_cpu` stays set until this CPU finished the post-run accounting;
    /// other CPUs skip the record and reapers wait it out, which restores
    /// the exclusivity a real scheduler gets from holding the record lock
    /// across the hardware context switch.
    fn run_process(
        &self,
        cpu: usize,
        id: SlotId,
        slot: &Slot,
        rec: &mut MutexGuard<'_, ProcRecord>,
    ) {
        debug_assert_eq!(rec.state, ProcState::Runnable);
        debug_assert!(!rec.on_cpu);

        let now = self.clock.now();
        if rec.is_batch {
            let mut batch = self.batch.lock();
            batch.note_start(now);
            batch.add_waiting(now.saturating_sub(rec.enqueued_at));
        }

        rec.state = ProcState::Running;
        rec.on_cpu = true;
        rec.dispatched_at = now;
        trace!("cpu {}: dispatch pid {} (slot {})", cpu, rec.pid, id);

        // Hand the CPU to the process thread; control returns once it has
        // moved itself out of Running (block, yield, or exit).
        slot.cv.notify_all();
        while rec.state == ProcState::Running {
            slot.cv.wait(rec);
        }

        if rec.is_batch {
            let measured = rec.last_stop.saturating_sub(rec.dispatched_at);
            let previous = rec.burst_est;
            {
                let mut batch = self.batch.lock();
                if previous > 0 {
                    batch.observe_estimate(previous);
                }
                if measured > 0 {
                    batch.observe_burst(measured);
                }
                if previous > 0 && measured > 0 {
                    batch.observe_estimate_error(measured.abs_diff(previous));
                }
            }
            rec.burst_est = next_burst_estimate(measured, previous, self.cfg.burst_alpha);
        }

        rec.on_cpu = false;
        // Release reapers waiting for the run accounting to finish.
        slot.cv.notify_all();
        trace!("cpu {}: pid {} left the cpu as {:?}", cpu, rec.pid, rec.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_estimate_matches_exponential_smoothing() {
        // (1 - 1/2) * 20 + 1/2 * 10 = 15
        assert_eq!(next_burst_estimate(20, 10, (1, 2)), 15);
    }

    #[test]
    fn burst_estimate_without_history_keeps_fraction_of_measured() {
        assert_eq!(next_burst_estimate(8, 0, (1, 2)), 4);
    }

    #[test]
    fn burst_estimate_integer_arithmetic_is_stable() {
        // alpha = 1/4: 9 - 9/4 + 5/4 = 8 in integer arithmetic.
        assert_eq!(next_burst_estimate(9, 5, (1, 4)), 8);
    }
}
